use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::importer::{ImportOptions, DEFAULT_HEADER_SEARCH_ROWS, DEFAULT_PREVIEW_LIMIT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_header_search_rows")]
    pub header_search_rows: usize,
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
    #[serde(default)]
    pub strict_dates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_file: Option<String>,
}

fn default_header_search_rows() -> usize {
    DEFAULT_HEADER_SEARCH_ROWS
}

fn default_preview_limit() -> usize {
    DEFAULT_PREVIEW_LIMIT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_search_rows: default_header_search_rows(),
            preview_limit: default_preview_limit(),
            strict_dates: false,
            profiles_file: None,
        }
    }
}

impl Settings {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            header_search_rows: self.header_search_rows,
            preview_limit: self.preview_limit,
            strict_dates: self.strict_dates,
        }
    }

    pub fn profiles_path(&self) -> Option<PathBuf> {
        self.profiles_file.as_deref().map(|p| PathBuf::from(shellexpand_path(p)))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("extracto")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path())
}

/// Defaults when the file does not exist; a malformed file is an error.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| IngestError::Settings(format!("{}: {e}", path.display())))
}

pub fn shellexpand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            header_search_rows: 40,
            preview_limit: 5,
            strict_dates: true,
            profiles_file: Some("/tmp/profiles.json".to_string()),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.header_search_rows, 20);
        assert_eq!(s.preview_limit, 20);
        assert!(!s.strict_dates);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"strict_dates": true}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert!(s.strict_dates);
        assert_eq!(s.header_search_rows, 20);
        assert!(s.profiles_file.is_none());
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings_from(&path), Err(IngestError::Settings(_))));
    }

    #[test]
    fn test_import_options_from_settings() {
        let s = Settings {
            preview_limit: 3,
            ..Settings::default()
        };
        let options = s.import_options();
        assert_eq!(options.preview_limit, 3);
        assert_eq!(options.header_search_rows, 20);
    }

    #[test]
    fn test_shellexpand_path() {
        assert_eq!(shellexpand_path("/abs/path.json"), "/abs/path.json");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                shellexpand_path("~/p.json"),
                format!("{}/p.json", home.to_string_lossy())
            );
        }
    }
}

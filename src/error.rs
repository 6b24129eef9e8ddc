use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("The file is empty")]
    EmptyFile,

    #[error("The file could not be read: {0}")]
    Unreadable(String),

    #[error("Unknown bank profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid bank profile '{id}': {reason}")]
    InvalidProfile { id: String, reason: String },

    #[error("Invalid column mapping: {0}")]
    InvalidMapping(String),

    #[error("Spreadsheet support is not enabled in this build")]
    SpreadsheetUnsupported,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Import failed: {0}")]
    Import(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::InvalidProfile {
            id: "acme".to_string(),
            reason: "no date vocabulary".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid bank profile 'acme': no date vocabulary");
        assert_eq!(IngestError::EmptyFile.to_string(), "The file is empty");
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: IngestError = io.into();
        assert!(matches!(err, IngestError::Io(_)));
    }
}

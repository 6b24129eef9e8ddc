pub mod detect;
pub mod import;
pub mod profiles;

use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use extracto::error::Result;
use extracto::importer::ImportOptions;
use extracto::logging::LogFormat;
use extracto::profiles::ProfileRegistry;
use extracto::settings::{load_settings, Settings};

#[derive(Parser)]
#[command(
    name = "extracto",
    version,
    about = "Read bank statements: detect the header, parse movements, flag duplicates."
)]
pub struct Cli {
    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
    /// JSON file with extra or overriding bank profiles
    #[arg(long, global = true)]
    pub profiles: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a statement and show its movements.
    Import {
        /// Path to a CSV, XLSX or XLS statement
        file: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        /// Keep only the first movement of each duplicate group
        #[arg(long)]
        dedupe: bool,
        /// Explicit column mapping, e.g. date=0,description=2,amount=3
        #[arg(long)]
        map: Option<String>,
        /// File line of the first movement when --map is given
        #[arg(long = "data-start", default_value_t = 2)]
        data_start: usize,
        /// Number of movements to show (overrides settings)
        #[arg(long)]
        preview: Option<usize>,
        /// Report unparsable dates as row errors
        #[arg(long = "strict-dates")]
        strict_dates: bool,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Show which header row and columns would be used.
    Detect {
        /// Path to a CSV, XLSX or XLS statement
        file: PathBuf,
        /// Print the detection as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List known bank profiles.
    Profiles {
        /// Print the profiles as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions.
    Completions {
        shell: Shell,
    },
}

/// Options shared by commands that read a statement.
#[derive(Args)]
pub struct SourceArgs {
    /// Bank profile id to use instead of auto-detection
    #[arg(long)]
    pub bank: Option<String>,
    /// Declared content type (e.g. text/csv)
    #[arg(long = "content-type")]
    pub content_type: Option<String>,
    /// Rows searched for the header (overrides settings)
    #[arg(long)]
    pub window: Option<usize>,
}

/// Settings, registry and options resolved once per invocation.
pub struct Context {
    pub registry: ProfileRegistry,
    pub options: ImportOptions,
}

impl Context {
    pub fn load(profiles: Option<&Path>, window: Option<usize>) -> Result<Self> {
        let settings = load_settings()?;
        Self::from_settings(&settings, profiles, window)
    }

    pub fn from_settings(
        settings: &Settings,
        profiles: Option<&Path>,
        window: Option<usize>,
    ) -> Result<Self> {
        let profiles_file = profiles.map(Path::to_path_buf).or_else(|| settings.profiles_path());
        let registry = ProfileRegistry::load(profiles_file.as_deref())?;
        let mut options = settings.import_options();
        if let Some(window) = window {
            options.header_search_rows = window;
        }
        Ok(Self { registry, options })
    }
}

pub fn completions(shell: Shell) -> Result<()> {
    clap_complete::generate(shell, &mut Cli::command(), "extracto", &mut io::stdout());
    Ok(())
}

//! Bank statement ingestion.
//!
//! Raw CSV or spreadsheet bytes go in; normalized movements, row-level
//! errors, the matched bank profile and duplicate statistics come out. See
//! [`import_statement`] for the whole pipeline.

pub mod dedupe;
pub mod error;
pub mod filetype;
pub mod fmt;
pub mod header;
pub mod importer;
pub mod junk;
pub mod logging;
pub mod models;
pub mod parser;
pub mod profiles;
pub mod reader;
pub mod settings;
pub mod text;

pub use dedupe::{dedupe, duplicate_stats, exclude_existing, flag_duplicates, movement_hash, Fingerprint};
pub use error::{IngestError, Result};
pub use filetype::{detect_file_kind, FileKind};
pub use header::{detect_header, HeaderDetection};
pub use importer::{import_statement, ImportOptions, ImportRequest, ImportResult, ManualMapping};
pub use models::{Cell, ColumnMapping, ColumnRole, DuplicateStats, ParsedMovement, RawRow};
pub use profiles::{BankProfile, DateFormat, DecimalSeparator, ProfileRegistry};

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReconError {
    #[error("invalid sheet reference: {0}")]
    InvalidSheetRef(String),

    #[error("schema-store request failed: {0}")]
    RegistryHttp(String),

    #[error("schema-store returned status {status}: {message}")]
    RegistryStatus { status: u16, message: String },

    #[error("sheet export request failed: {0}")]
    SheetHttp(String),

    #[error("sheet export returned status {status}: {message}")]
    SheetStatus { status: u16, message: String },

    #[error("failed to parse CSV export: {0}")]
    CsvParse(String),

    #[error("expected {expected} columns, found {found}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("required column not found: {0}")]
    MissingColumn(String),

    #[error("unknown checklist in config: {0}")]
    UnknownChecklist(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl ReconError {
    /// Process exit code for the CLI: 2 for config/input problems, 3 for
    /// anything that failed on the network, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconError::RegistryHttp(_)
            | ReconError::RegistryStatus { .. }
            | ReconError::SheetHttp(_)
            | ReconError::SheetStatus { .. } => 3,
            ReconError::InvalidSheetRef(_)
            | ReconError::ConfigRead(_)
            | ReconError::ConfigParse(_)
            | ReconError::UnknownChecklist(_) => 2,
            _ => 1,
        }
    }
}

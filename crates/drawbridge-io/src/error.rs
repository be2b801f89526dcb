use std::path::PathBuf;

use thiserror::Error;

/// Result type local to drawbridge-io.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed data for '{name}': {reason}")]
    MalformedData { name: String, reason: String },

    #[error("data file not found: {0}")]
    MissingDataFile(PathBuf),

    #[error("{path}:{line}: cannot parse '{token}' in column '{column}' as a number")]
    CsvParse {
        path: PathBuf,
        line: u64,
        column: String,
        token: String,
    },

    #[error("{path}:{line}: {reason}")]
    CsvFormat {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("inconsistent output across chains: {0}")]
    InconsistentOutput(String),

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("no output files to parse")]
    NoOutputFiles,

    #[error("csv error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] drawbridge_core::error::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedData {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

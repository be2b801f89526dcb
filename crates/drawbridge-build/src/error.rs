use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Result type local to drawbridge-build.
pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Translator or build failure. `text` is the collaborator's output verbatim.
    #[error("compilation failed:\n{text}")]
    Compile {
        diagnostics: Vec<Diagnostic>,
        text: String,
    },

    #[error("include error in {path}: {reason}")]
    Include { path: PathBuf, reason: String },

    #[error("source file not found: {0}")]
    MissingSource(PathBuf),

    #[error("build tool: {0}")]
    Tool(String),

    #[error("build lock poisoned")]
    Poisoned,

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

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Diagnostics attached to a compile failure, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            BuildError::Compile { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Result type local to drawbridge-fit.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] drawbridge_io::Error),

    #[error(transparent)]
    Build(#[from] drawbridge_build::BuildError),

    #[error(transparent)]
    Exec(#[from] drawbridge_exec::ExecError),

    #[error(transparent)]
    Core(#[from] drawbridge_core::error::Error),

    #[error("executable not found: {0}")]
    MissingExecutable(PathBuf),

    #[error("result cache lock poisoned")]
    Poisoned,
}

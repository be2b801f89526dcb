#![forbid(unsafe_code)]
//! drawbridge-build: staleness-aware compilation cache.
//!
//! A compiled executable is reused only while its recorded signature (hash of
//! the include-expanded source, the compile options and the translator
//! version) matches the current inputs. Builds go through the `BuildTool`
//! trait; `CmdStanTool` drives the real translator and `make`.

pub mod cache;
pub mod diagnostics;
pub mod error;
pub mod options;
pub mod signature;
pub mod source;
pub mod tool;

pub use cache::{CompilationCache, CompiledArtifact};
pub use diagnostics::{parse_diagnostics, Diagnostic, Severity};
pub use error::{BuildError, Result};
pub use options::CompileOptions;
pub use signature::{compute_signature, ArtifactRecord};
pub use tool::{BuildOutput, BuildRequest, BuildTool, CmdStanTool};

#![forbid(unsafe_code)]
//! drawbridge: build, run and assemble results for a compiled sampling engine.
//!
//! The member crates do the work; this crate gathers the common entry points.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use drawbridge::{CmdStanTool, CompilationCache, CompileOptions, DataMap, Model, SamplerArgs, SessionConfig};
//!
//! # fn main() -> drawbridge::fit::Result<()> {
//! let cache = CompilationCache::new(Arc::new(CmdStanTool::from_env()?));
//! let model = Model::compile(&cache, Path::new("bernoulli.stan"), &CompileOptions::default(), false)?;
//! let data = DataMap::new().with("N", 3i64).with("y", vec![0i64, 1, 0]);
//! let fit = model.sample(Some(&data.into()), &SamplerArgs::default(), 4, &SessionConfig::default())?;
//! let theta = fit.variable("theta")?;
//! println!("{} draws", theta.values.len());
//! # Ok(())
//! # }
//! ```

pub use drawbridge_build as build;
pub use drawbridge_exec as exec;
pub use drawbridge_fit as fit;
pub use drawbridge_io as io;

pub use drawbridge_build::{BuildTool, CmdStanTool, CompilationCache, CompileOptions, Diagnostic, Severity};
pub use drawbridge_core::prelude::*;
pub use drawbridge_exec::{ChainInvocation, ChainResult, ChainStatus, Orchestrator, SamplerArgs};
pub use drawbridge_fit::{Fit, LazyDraws, Model};
pub use drawbridge_io::{parse_draws, serialize, DataFormat, DataInput, Selection};

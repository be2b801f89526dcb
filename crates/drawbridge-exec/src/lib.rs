#![forbid(unsafe_code)]
//! drawbridge-exec: concurrent supervision of sampler chain processes.
//!
//! Chains run as independent subprocesses under a bounded scheduler. Each one
//! is supervised to a terminal state (exit, timeout, or cancellation), its
//! console streams are captured separately, and optionally echoed line by
//! line to a shared console. The caller blocks until every chain is done.

pub mod cancel;
pub mod console;
pub mod interrupt;
pub mod invocation;
pub mod process;
pub mod result;
pub mod runtime;
pub mod scheduler;

pub use cancel::{CancelHandle, CancelToken};
pub use invocation::{ChainInvocation, SamplerArgs};
pub use result::{ChainResult, ChainStatus};
pub use runtime::{ChainFailureReport, ExecError, Orchestrator, Result};

//! Orchestrator: run a batch of chains to completion.
//!
//! - At most `max_parallel_chains` processes run at once; the rest queue.
//! - A failing chain never stops its siblings. Once every chain is terminal,
//!   any failure turns the whole call into `ExecError::ChainFailure`, which
//!   still carries the successful results.
//! - Cancellation kills and reaps every running child before the call
//!   returns: `ExecError::Cancelled` for the handle, `ExecError::Interrupted`
//!   for Ctrl-C. Each run starts uncancelled.

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use drawbridge_core::config::SessionConfig;

use crate::cancel::CancelHandle;
use crate::console::{spawn_printer, SharedWriter};
use crate::interrupt;
use crate::invocation::ChainInvocation;
use crate::process::run_chain;
use crate::result::{ChainResult, ChainStatus};
use crate::scheduler::run_bounded;

/// Result type local to drawbridge-exec.
pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{0}")]
    ChainFailure(ChainFailureReport),

    #[error("run cancelled before all chains finished")]
    Cancelled { results: Vec<ChainResult> },

    #[error("run interrupted before all chains finished")]
    Interrupted { results: Vec<ChainResult> },

    #[error("invalid invocation: {0}")]
    Invalid(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Per-chain results carried by a failure or cancellation.
    pub fn results(&self) -> Vec<&ChainResult> {
        match self {
            ExecError::ChainFailure(report) => report.all().collect(),
            ExecError::Cancelled { results } | ExecError::Interrupted { results } => {
                results.iter().collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Every failed chain with its captured text, plus the chains that succeeded.
#[derive(Debug, Clone)]
pub struct ChainFailureReport {
    pub failed: Vec<ChainResult>,
    pub succeeded: Vec<ChainResult>,
}

impl ChainFailureReport {
    pub fn all(&self) -> impl Iterator<Item = &ChainResult> {
        self.failed.iter().chain(self.succeeded.iter())
    }

    pub fn failed_ids(&self) -> Vec<u64> {
        self.failed.iter().map(|r| r.chain_id.get()).collect()
    }
}

impl std::fmt::Display for ChainFailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.failed.len() + self.succeeded.len();
        write!(f, "{} of {} chains failed", self.failed.len(), total)?;
        for r in &self.failed {
            write!(f, "\n  chain {}: {}", r.chain_id, r.status)?;
            if let Some(msg) = r.last_message() {
                write!(f, ": {msg}")?;
            }
        }
        Ok(())
    }
}

pub struct Orchestrator {
    max_parallel: usize,
    timeout: Option<Duration>,
    verbose: bool,
    cancel_on_interrupt: bool,
    cancel: CancelHandle,
    console: SharedWriter,
}

impl Orchestrator {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            max_parallel: cfg.max_parallel_chains.max(1),
            timeout: cfg.chain_timeout(),
            verbose: cfg.verbose,
            cancel_on_interrupt: cfg.cancel_on_interrupt,
            cancel: CancelHandle::new(),
            console: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
        }
    }

    /// Send verbose chain output somewhere other than stdout.
    pub fn with_console(mut self, out: Box<dyn Write + Send>) -> Self {
        self.console = Arc::new(Mutex::new(out));
        self
    }

    pub fn with_verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Blocking entry point. Must not be called from inside a tokio runtime;
    /// use `run_async` there.
    pub fn run(&self, invocations: Vec<ChainInvocation>) -> Result<Vec<ChainResult>> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.run_async(invocations))
    }

    pub async fn run_async(&self, invocations: Vec<ChainInvocation>) -> Result<Vec<ChainResult>> {
        validate(&invocations)?;
        if invocations.is_empty() {
            return Ok(Vec::new());
        }
        for inv in &invocations {
            if let Some(dir) = inv.output_file.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
        }

        let (console, printer) = if self.verbose {
            let (tx, handle) = spawn_printer(Arc::clone(&self.console));
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };
        self.cancel.reset();
        let interrupt_guard = self
            .cancel_on_interrupt
            .then(|| interrupt::register(self.cancel.clone()));

        tracing::info!(
            chains = invocations.len(),
            max_parallel = self.max_parallel,
            "starting chains"
        );
        let timeout = self.timeout;
        let cancel = &self.cancel;
        let results = run_bounded(invocations, self.max_parallel, |inv| {
            run_chain(inv, timeout, cancel.token(), console.clone())
        })
        .await;

        drop(console);
        if let Some(printer) = printer {
            let _ = printer.await;
        }
        let interrupted = interrupt_guard.as_ref().is_some_and(|g| g.interrupted());
        drop(interrupt_guard);
        let results = results?;

        if results.iter().any(|r| r.status == ChainStatus::Cancelled) {
            if interrupted {
                return Err(ExecError::Interrupted { results });
            }
            return Err(ExecError::Cancelled { results });
        }
        let (succeeded, failed): (Vec<_>, Vec<_>) =
            results.iter().cloned().partition(ChainResult::succeeded);
        if !failed.is_empty() {
            let report = ChainFailureReport { failed, succeeded };
            tracing::warn!(failed = ?report.failed_ids(), "chains failed");
            return Err(ExecError::ChainFailure(report));
        }
        tracing::info!(chains = results.len(), "all chains succeeded");
        Ok(results)
    }
}

fn validate(invocations: &[ChainInvocation]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut outputs = HashSet::new();
    for inv in invocations {
        if !ids.insert(inv.chain_id) {
            return Err(ExecError::Invalid(format!("duplicate chain id {}", inv.chain_id)));
        }
        if !outputs.insert(&inv.output_file) {
            return Err(ExecError::Invalid(format!(
                "chains share output file {}",
                inv.output_file.display()
            )));
        }
    }
    Ok(())
}

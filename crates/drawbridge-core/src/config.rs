//! Session configuration threaded explicitly through build/run/parse calls.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory receiving serialized data files and per-chain output files.
    pub output_dir: PathBuf,

    /// Upper bound on concurrently running chain subprocesses.
    pub max_parallel_chains: usize,

    /// Optional wall-clock limit per chain. `None` means no limit.
    pub chain_timeout_ms: Option<u64>,

    /// Echo chain console output to the caller's stdout as it arrives.
    pub verbose: bool,

    /// Treat Ctrl-C as a cancellation request for running chains.
    pub cancel_on_interrupt: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("drawbridge"),
            max_parallel_chains: 4,
            chain_timeout_ms: None,
            verbose: false,
            cancel_on_interrupt: false,
        }
    }
}

impl SessionConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `DRAWBRIDGE_OUTPUT_DIR`: output directory
    /// - `DRAWBRIDGE_MAX_PARALLEL_CHAINS`: concurrent chain limit
    /// - `DRAWBRIDGE_CHAIN_TIMEOUT_MS`: per-chain timeout in milliseconds
    /// - `DRAWBRIDGE_VERBOSE`: `1`/`true` to echo chain output
    /// - `DRAWBRIDGE_CANCEL_ON_INTERRUPT`: `1`/`true` to cancel on Ctrl-C
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("DRAWBRIDGE_OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(s);
        }

        if let Ok(s) = std::env::var("DRAWBRIDGE_MAX_PARALLEL_CHAINS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_chains = v;
            }
        }

        if let Ok(s) = std::env::var("DRAWBRIDGE_CHAIN_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.chain_timeout_ms = Some(v);
            }
        }

        if let Ok(s) = std::env::var("DRAWBRIDGE_VERBOSE") {
            cfg.verbose = parse_flag(&s);
        }

        if let Ok(s) = std::env::var("DRAWBRIDGE_CANCEL_ON_INTERRUPT") {
            cfg.cancel_on_interrupt = parse_flag(&s);
        }

        cfg
    }

    /// Per-chain timeout as a `Duration`.
    pub fn chain_timeout(&self) -> Option<Duration> {
        self.chain_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_parallel_chains == 0 {
            return Err(crate::error::Error::Config(
                "max_parallel_chains must be at least 1".into(),
            ));
        }
        if self.chain_timeout_ms == Some(0) {
            return Err(crate::error::Error::Config(
                "chain_timeout_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

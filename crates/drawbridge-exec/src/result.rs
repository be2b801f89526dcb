use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use drawbridge_core::id::ChainId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut { after: Duration },
    Cancelled,
    SpawnFailed { reason: String },
    /// Exited 0 without writing its output file.
    MissingOutput,
}

impl std::fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainStatus::Succeeded => write!(f, "succeeded"),
            ChainStatus::Failed {
                exit_code: Some(code),
            } => write!(f, "exit code {code}"),
            ChainStatus::Failed { exit_code: None } => write!(f, "terminated by signal"),
            ChainStatus::TimedOut { after } => write!(f, "timed out after {after:?}"),
            ChainStatus::Cancelled => write!(f, "cancelled"),
            ChainStatus::SpawnFailed { reason } => write!(f, "failed to start: {reason}"),
            ChainStatus::MissingOutput => write!(f, "exited 0 but wrote no output file"),
        }
    }
}

/// Terminal state of one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResult {
    pub chain_id: ChainId,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub output_file: PathBuf,
    pub latent_file: Option<PathBuf>,
    pub status: ChainStatus,
    pub elapsed: Duration,
}

impl ChainResult {
    pub fn succeeded(&self) -> bool {
        self.status == ChainStatus::Succeeded
    }

    /// Captured console text, stdout then stderr.
    pub fn console(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }

    /// Last non-empty line of stderr (or stdout), for short reports.
    pub fn last_message(&self) -> Option<&str> {
        last_line(&self.stderr).or_else(|| last_line(&self.stdout))
    }
}

fn last_line(s: &str) -> Option<&str> {
    s.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

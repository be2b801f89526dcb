//! Supervision of a single chain process.
//!
//! The child's stdout and stderr are drained by two pump tasks into separate
//! buffers. The supervisor races the child's exit against the optional
//! timeout and the cancel token; on timeout or cancel the child is killed and
//! then reaped, so no chain outlives the call.

use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use drawbridge_core::id::ChainId;

use crate::cancel::CancelToken;
use crate::console::ConsoleSender;
use crate::invocation::ChainInvocation;
use crate::result::{ChainResult, ChainStatus};

/// How long to keep reading pipes after the child is gone. A grandchild that
/// inherited the pipes can otherwise hold them open indefinitely.
const PIPE_DRAIN: Duration = Duration::from_secs(2);

// ETXTBSY: the executable was written moments ago and is still open for writing
const TEXT_FILE_BUSY: i32 = 26;
const SPAWN_RETRIES: u32 = 5;

enum Outcome {
    Exited(io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

pub async fn run_chain(
    inv: ChainInvocation,
    timeout: Option<Duration>,
    mut cancel: CancelToken,
    console: Option<ConsoleSender>,
) -> ChainResult {
    let started = Instant::now();
    let chain = inv.chain_id;
    let finish = |status: ChainStatus, exit_code: Option<i32>, stdout: String, stderr: String| ChainResult {
        chain_id: inv.chain_id,
        exit_code,
        stdout,
        stderr,
        output_file: inv.output_file.clone(),
        latent_file: inv.latent_file.clone(),
        status,
        elapsed: started.elapsed(),
    };

    if cancel.is_cancelled() {
        return finish(ChainStatus::Cancelled, None, String::new(), String::new());
    }

    let mut child = match spawn(&inv).await {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(chain = %chain, path = %inv.executable.display(), error = %e, "chain failed to start");
            return finish(
                ChainStatus::SpawnFailed {
                    reason: e.to_string(),
                },
                None,
                String::new(),
                e.to_string(),
            );
        }
    };
    tracing::debug!(chain = %chain, pid = ?child.id(), "chain started");

    let stdout_buf = Arc::new(Mutex::new(String::new()));
    let stderr_buf = Arc::new(Mutex::new(String::new()));
    let pumps = [
        child
            .stdout
            .take()
            .map(|r| tokio::spawn(pump(r, chain, stdout_buf.clone(), console.clone()))),
        child
            .stderr
            .take()
            .map(|r| tokio::spawn(pump(r, chain, stderr_buf.clone(), console.clone()))),
    ];
    drop(console);

    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = deadline => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    let (status, exit) = match outcome {
        Outcome::Exited(exit) => (None, exit),
        Outcome::TimedOut => {
            tracing::warn!(chain = %chain, timeout = ?timeout, "chain timed out; killing");
            let after = timeout.unwrap_or_default();
            (Some(ChainStatus::TimedOut { after }), kill(&mut child).await)
        }
        Outcome::Cancelled => {
            tracing::info!(chain = %chain, "chain cancelled; killing");
            (Some(ChainStatus::Cancelled), kill(&mut child).await)
        }
    };

    for pump in pumps.into_iter().flatten() {
        drain(pump).await;
    }
    let stdout = take(&stdout_buf);
    let stderr = take(&stderr_buf);

    let exit_code = exit.as_ref().ok().and_then(|s| s.code());
    let status = status.unwrap_or_else(|| match &exit {
        Ok(s) if s.success() && !inv.output_file.is_file() => ChainStatus::MissingOutput,
        Ok(s) if s.success() => ChainStatus::Succeeded,
        Ok(s) => ChainStatus::Failed { exit_code: s.code() },
        Err(e) => {
            tracing::warn!(chain = %chain, error = %e, "could not wait for chain");
            ChainStatus::Failed { exit_code: None }
        }
    });
    tracing::debug!(chain = %chain, status = %status, elapsed = ?started.elapsed(), "chain finished");
    finish(status, exit_code, stdout, stderr)
}

async fn spawn(inv: &ChainInvocation) -> io::Result<Child> {
    let mut attempt = 0;
    loop {
        let mut cmd = Command::new(&inv.executable);
        cmd.args(&inv.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &inv.working_dir {
            cmd.current_dir(dir);
        }
        match cmd.spawn() {
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) && attempt < SPAWN_RETRIES => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
            }
            other => return other,
        }
    }
}

async fn kill(child: &mut Child) -> io::Result<std::process::ExitStatus> {
    if let Err(e) = child.start_kill() {
        // already exited between the race and the kill
        tracing::debug!(error = %e, "kill failed");
    }
    child.wait().await
}

async fn pump<R: AsyncRead + Unpin>(
    reader: R,
    chain: ChainId,
    sink: Arc<Mutex<String>>,
    console: Option<ConsoleSender>,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                if let Ok(mut s) = sink.lock() {
                    s.push_str(&line);
                }
                if let Some(tx) = &console {
                    tx.send(chain, line.trim_end_matches(['\n', '\r']));
                }
            }
        }
    }
}

async fn drain(mut pump: JoinHandle<()>) {
    if tokio::time::timeout(PIPE_DRAIN, &mut pump).await.is_err() {
        pump.abort();
    }
}

fn take(buf: &Mutex<String>) -> String {
    buf.lock().map(|mut s| std::mem::take(&mut *s)).unwrap_or_default()
}

//! Process-wide Ctrl-C routing.
//!
//! The SIGINT handler tokio installs is never removed, so it is installed
//! once, on a dedicated listener thread, the first time a run asks for it.
//! That thread outlives every per-call runtime.
//!
//! While runs are registered an interrupt cancels each of them. With nothing
//! registered the process exits with status 130, as it would without a
//! handler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::{Lazy, OnceCell};

use crate::cancel::CancelHandle;

/// Exit status used when an interrupt arrives while no run is active.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

struct Registration {
    id: u64,
    cancel: CancelHandle,
    interrupted: Arc<AtomicBool>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static ACTIVE: Lazy<Mutex<Vec<Registration>>> = Lazy::new(|| Mutex::new(Vec::new()));
static LISTENER: OnceCell<()> = OnceCell::new();

fn active() -> MutexGuard<'static, Vec<Registration>> {
    ACTIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps one run registered for interrupts; deregisters on drop.
#[derive(Debug)]
pub struct InterruptGuard {
    id: u64,
    interrupted: Arc<AtomicBool>,
}

impl InterruptGuard {
    /// Whether an interrupt cancelled this run.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        active().retain(|r| r.id != self.id);
    }
}

/// Route interrupts to `cancel` until the returned guard is dropped.
pub fn register(cancel: CancelHandle) -> InterruptGuard {
    start_listener();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let interrupted = Arc::new(AtomicBool::new(false));
    active().push(Registration {
        id,
        cancel,
        interrupted: Arc::clone(&interrupted),
    });
    InterruptGuard { id, interrupted }
}

/// Cancel every registered run. Returns how many there were.
pub(crate) fn route_interrupt() -> usize {
    let runs = active();
    for run in runs.iter() {
        run.interrupted.store(true, Ordering::SeqCst);
        run.cancel.cancel();
    }
    runs.len()
}

/// Installs the handler on first use and returns once it is live.
fn start_listener() {
    LISTENER.get_or_init(|| {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("drawbridge-interrupt".into())
            .spawn(move || listen(ready_tx));
        match spawned {
            // a listener that fails to start drops the sender
            Ok(_) => {
                let _ = ready_rx.recv();
            }
            Err(e) => tracing::warn!(error = %e, "could not start interrupt listener"),
        }
    });
}

fn listen(ready: Sender<()>) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::warn!(error = %e, "interrupt listener has no runtime");
            return;
        }
    };
    if let Err(e) = rt.block_on(wait_for_interrupts(ready)) {
        tracing::warn!(error = %e, "cannot listen for interrupts");
    }
}

#[cfg(unix)]
async fn wait_for_interrupts(ready: Sender<()>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let _ = ready.send(());
    while sigint.recv().await.is_some() {
        on_interrupt();
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_interrupts(ready: Sender<()>) -> std::io::Result<()> {
    let _ = ready.send(());
    loop {
        tokio::signal::ctrl_c().await?;
        on_interrupt();
    }
}

fn on_interrupt() {
    let cancelled = route_interrupt();
    if cancelled == 0 {
        tracing::info!("interrupt with no active run; exiting");
        std::process::exit(INTERRUPT_EXIT_CODE);
    }
    tracing::info!(runs = cancelled, "interrupt received; cancelling chains");
}

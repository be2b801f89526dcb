//! Console multiplexer: one printer task owns the output, chains send it
//! whole lines, so lines from different chains interleave but never tear.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use drawbridge_core::id::ChainId;

/// Where echoed chain output goes.
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

#[derive(Debug)]
struct ConsoleLine {
    chain: ChainId,
    text: String,
}

#[derive(Debug, Clone)]
pub struct ConsoleSender {
    tx: mpsc::UnboundedSender<ConsoleLine>,
}

impl ConsoleSender {
    pub fn send(&self, chain: ChainId, text: &str) {
        // the printer only goes away after every sender is dropped
        let _ = self.tx.send(ConsoleLine {
            chain,
            text: text.to_string(),
        });
    }
}

/// Start the printer. It exits once every `ConsoleSender` is dropped.
pub fn spawn_printer(out: SharedWriter) -> (ConsoleSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ConsoleLine>();
    let handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Ok(mut w) = out.lock() {
                let _ = writeln!(w, "chain {}: {}", line.chain, line.text);
            }
        }
        if let Ok(mut w) = out.lock() {
            let _ = w.flush();
        }
    });
    (ConsoleSender { tx }, handle)
}

//! Bounded-concurrency task runner.
//!
//! Every item becomes one task on a `JoinSet`; a semaphore caps how many run
//! at once and the rest wait for a permit. Results come back in input order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::runtime::{ExecError, Result};

pub async fn run_bounded<T, F, Fut>(items: Vec<T>, max_parallel: usize, f: F) -> Result<Vec<Fut::Output>>
where
    F: Fn(T) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let n = items.len();
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut set = JoinSet::new();

    for (idx, item) in items.into_iter().enumerate() {
        // `f` must not start work before the future is polled
        let task = f(item);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| ExecError::Runtime(format!("semaphore closed: {e}")))?;
            Ok::<_, ExecError>((idx, task.await))
        });
    }

    let mut slots: Vec<Option<Fut::Output>> = (0..n).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (idx, out) = joined.map_err(|e| ExecError::Runtime(format!("task failed: {e}")))??;
        slots[idx] = Some(out);
    }
    slots
        .into_iter()
        .map(|s| s.ok_or_else(|| ExecError::Runtime("task produced no result".into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_the_limit_and_keeps_order() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..10).collect();

        let out = run_bounded(items, 3, |i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 * (10 - i as u64))).await;
                running.fetch_sub(1, Ordering::SeqCst);
                i * 2
            }
        })
        .await
        .unwrap();

        assert_eq!(out, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}

//! Cancellable fixed-interval background work.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A background loop that runs one pass per tick until stopped.
///
/// A failed pass is logged and the loop waits for the next tick. A stop
/// request interrupts a pass that is still running; the pass future is
/// dropped, so any transaction it held open is rolled back.
pub struct PeriodicTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut, E>(name: &'static str, period: Duration, mut pass: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + 'static,
    {
        let (shutdown, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(task = name, period_ms = period.as_millis() as u64, "background task started");

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = stop_rx.changed() => {
                        tracing::warn!(task = name, "pass interrupted by shutdown");
                        break;
                    }
                    outcome = pass() => {
                        if let Err(err) = outcome {
                            tracing::error!(task = name, error = %err, "background pass failed");
                        }
                    }
                }
            }

            tracing::info!(task = name, "background task stopped");
        });

        Self {
            name,
            shutdown,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop and wait up to `grace` for it to exit.
    pub async fn stop(self, grace: Duration) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        let mut handle = self.handle;

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined.with_context(|| format!("task '{}' panicked", self.name)),
            Err(_) => {
                handle.abort();
                anyhow::bail!("task '{}' did not stop within {:?}", self.name, grace)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn runs_a_pass_per_tick_until_stopped() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let task = PeriodicTask::spawn("counter", Duration::from_secs(60), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::convert::Infallible>(())
            }
        });

        // The first tick fires immediately, then once per period.
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 3);

        task.stop(Duration::from_secs(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pass_does_not_end_the_loop() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let task = PeriodicTask::spawn("flaky", Duration::from_secs(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    Err("store unavailable")
                } else {
                    Ok(())
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 5);
        assert!(!task.is_finished());

        task.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_hanging_pass() {
        let task = PeriodicTask::spawn("stuck", Duration::from_secs(10), || async {
            std::future::pending::<()>().await;
            Ok::<_, std::convert::Infallible>(())
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.stop(Duration::from_secs(5)).await.unwrap();
    }
}

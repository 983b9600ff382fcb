use log::debug;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A cancellable periodic callback.
///
/// Before every tick the task asks `is_active`; once that answers false, or
/// the callback returns `ControlFlow::Break`, the task stops rescheduling
/// itself and finishes. The first tick fires one `period` after spawning.
pub struct RepeatingTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    pub fn spawn<A, F>(name: &'static str, period: Duration, is_active: A, mut tick: F) -> Self
    where
        A: Fn() -> bool + Send + 'static,
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !is_active() {
                    break;
                }
                if tick().is_break() {
                    break;
                }
            }
            debug!("{} task finished", name);
        });

        Self {
            name,
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancel the task and wait until it is gone. Must not be called from
    /// inside the task's own callback.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    log::error!("{} task failed: {}", self.name, e);
                }
            }
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_flag_clears() {
        let active = Arc::new(AtomicBool::new(true));
        let ticks = Arc::new(AtomicUsize::new(0));

        let gate = active.clone();
        let counter = ticks.clone();
        let task = RepeatingTask::spawn(
            "counter",
            Duration::from_secs(1),
            move || gate.load(Ordering::SeqCst),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            },
        );

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        active.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(task.is_finished());
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let task = RepeatingTask::spawn(
            "limited",
            Duration::from_millis(16),
            || true,
            move || {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(task.is_finished());
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_task() {
        let task = RepeatingTask::spawn(
            "idle",
            Duration::from_secs(1),
            || true,
            || ControlFlow::Continue(()),
        );
        assert!(!task.is_finished());
        task.shutdown().await;
    }
}

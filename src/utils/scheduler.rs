//! Cancellable scheduled tasks
//!
//! Replaces free-floating `setInterval`/`setTimeout` style timers with a
//! handle whose lifetime bounds the task: dropping the handle aborts it.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A timer task owned by the component that scheduled it.
///
/// Must be created from within a tokio runtime.
pub struct ScheduledTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Run `f` every `period`, first call after one full period.
    pub fn every<F>(name: &'static str, period: Duration, mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                f();
            }
        });

        tracing::debug!("Scheduled repeating task '{}' every {:?}", name, period);
        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Run `f` once after `delay`.
    pub fn after<F>(name: &'static str, delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });

        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Abort the task. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                tracing::trace!("Cancelling scheduled task '{}'", self.name);
            }
            handle.abort();
        }
    }

    /// Whether the task has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

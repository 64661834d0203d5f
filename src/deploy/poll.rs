//! Poll-then-sleep loops with a deadline and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{DeployError, Result};

/// Default interval between change set status polls.
pub const DEFAULT_CHANGE_SET_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval between stack status polls.
pub const DEFAULT_STACK_INTERVAL: Duration = Duration::from_secs(3);

/// Intervals and deadline for the deploy's poll loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Interval between change set status polls.
    pub change_set_interval: Duration,
    /// Interval between stack status polls.
    pub stack_interval: Duration,
    /// Upper bound on each wait; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            change_set_interval: DEFAULT_CHANGE_SET_INTERVAL,
            stack_interval: DEFAULT_STACK_INTERVAL,
            timeout: None,
        }
    }
}

impl PollSettings {
    /// Settings that never sleep between polls.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            change_set_interval: Duration::ZERO,
            stack_interval: Duration::ZERO,
            timeout: None,
        }
    }

    /// Sets the wait timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A shared flag that stops poll loops.
///
/// Clones share the flag, so one clone can be handed to a signal handler.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once the flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One poll loop.
///
/// Call [`Poller::check`] before every request and [`Poller::sleep`] between
/// requests.
#[derive(Debug)]
pub struct Poller<'a> {
    waiting_for: String,
    interval: Duration,
    timeout: Option<Duration>,
    start: Instant,
    cancellation: &'a Cancellation,
}

impl<'a> Poller<'a> {
    /// Starts a poll loop. The deadline counts from now.
    #[must_use]
    pub fn start(
        waiting_for: impl Into<String>,
        interval: Duration,
        timeout: Option<Duration>,
        cancellation: &'a Cancellation,
    ) -> Self {
        let waiting_for = waiting_for.into();
        debug!("Waiting for {waiting_for}");

        Self {
            waiting_for,
            interval,
            timeout,
            start: Instant::now(),
            cancellation,
        }
    }

    /// Fails if the loop was cancelled or ran past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Cancelled`] or [`DeployError::Timeout`].
    pub fn check(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(DeployError::Cancelled {
                waiting_for: self.waiting_for.clone(),
            }
            .into());
        }

        if let Some(timeout) = self.timeout {
            let elapsed = self.start.elapsed();
            if elapsed >= timeout {
                return Err(DeployError::Timeout {
                    waiting_for: self.waiting_for.clone(),
                    waited_secs: elapsed.as_secs(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Sleeps for one interval.
    pub async fn sleep(&self) {
        trace!("Polling {} again in {:?}", self.waiting_for, self.interval);
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CfnDeployError;

    #[test]
    fn test_default_intervals() {
        let settings = PollSettings::default();
        assert_eq!(settings.change_set_interval, Duration::from_secs(1));
        assert_eq!(settings.stack_interval, Duration::from_secs(3));
        assert!(settings.timeout.is_none());
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let cancellation = Cancellation::new();
        let handle = cancellation.clone();
        assert!(!cancellation.is_cancelled());

        handle.cancel();
        assert!(cancellation.is_cancelled());
    }

    #[test]
    fn test_cancelled_poller_fails() {
        let cancellation = Cancellation::new();
        let poller = Poller::start("stack app", Duration::ZERO, None, &cancellation);
        assert!(poller.check().is_ok());

        cancellation.cancel();
        let err = poller.check().unwrap_err();
        assert!(matches!(err, CfnDeployError::Deploy(DeployError::Cancelled { .. })));
        assert_eq!(err.to_string(), "Deployment error: Cancelled while waiting for stack app");
    }

    #[test]
    fn test_expired_poller_fails() {
        let cancellation = Cancellation::new();
        let poller = Poller::start("change set", Duration::ZERO, Some(Duration::ZERO), &cancellation);
        let err = poller.check().unwrap_err();
        assert!(matches!(err, CfnDeployError::Deploy(DeployError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_sleep_waits_one_interval() {
        let cancellation = Cancellation::new();
        let poller = Poller::start("stack", Duration::from_millis(20), None, &cancellation);

        let before = Instant::now();
        poller.sleep().await;
        assert!(before.elapsed() >= Duration::from_millis(20));
    }
}

//! Stack convergence monitoring.
//!
//! After a change set is executed the stack status is polled until it no
//! longer ends in `IN_PROGRESS`. Every poll also reports the stack events that
//! appeared since the previous one, oldest first.
//!
//! Right after execution the service may still report the status left by the
//! previous operation. A terminal status only counts once the execution has
//! been seen, either as an `IN_PROGRESS` status or as an event carrying the
//! execution's client token.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cloudformation::{CloudFormationApi, Stack, StackEvent};
use crate::error::{DeployError, Result};

use super::lookup::StackLookup;
use super::poll::{Cancellation, PollSettings, Poller};
use super::progress::{ProgressEvent, ProgressSink};

/// Terminal statuses that count as a successful deploy.
pub const SUCCESS_STATUSES: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE"];

/// Returns true if a terminal status counts as success.
#[must_use]
pub fn is_success(status: &str) -> bool {
    SUCCESS_STATUSES.contains(&status)
}

/// The stack in its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    /// The stack as last described.
    pub stack: Stack,
    /// Whether the terminal status counts as success.
    pub success: bool,
}

impl Convergence {
    /// Terminal status.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.stack.status
    }

    /// Reason for the status, if the service gave one.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.stack.status_reason.as_deref()
    }
}

/// Polls a stack until it converges.
pub struct DeploymentMonitor<'a, C: CloudFormationApi + ?Sized> {
    api: &'a C,
    progress: &'a dyn ProgressSink,
    interval: Duration,
    timeout: Option<Duration>,
    cancellation: &'a Cancellation,
}

impl<'a, C: CloudFormationApi + ?Sized> DeploymentMonitor<'a, C> {
    /// Creates a monitor.
    #[must_use]
    pub const fn new(
        api: &'a C,
        progress: &'a dyn ProgressSink,
        settings: &PollSettings,
        cancellation: &'a Cancellation,
    ) -> Self {
        Self {
            api,
            progress,
            interval: settings.stack_interval,
            timeout: settings.timeout,
            cancellation,
        }
    }

    /// Waits for the stack to reach a terminal status.
    ///
    /// Events older than `floor` belong to earlier operations and are not
    /// reported. `client_token` is the token the change set was executed with.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack disappears, a request fails, the wait
    /// times out, or it is cancelled.
    pub async fn watch(
        &self,
        stack_name: &str,
        floor: DateTime<Utc>,
        client_token: &str,
    ) -> Result<Convergence> {
        let lookup = StackLookup::new(self.api);
        let poller = Poller::start(
            format!("stack {stack_name}"),
            self.interval,
            self.timeout,
            self.cancellation,
        );
        let mut last_seen: Option<String> = None;
        let mut started = false;

        loop {
            poller.sleep().await;
            poller.check()?;

            let stack = lookup.find(stack_name).await?.ok_or_else(|| DeployError::StackNotFound {
                stack_name: stack_name.to_string(),
            })?;

            let fresh = self
                .new_events(stack_name, floor, last_seen.as_deref())
                .await?;
            for event in &fresh {
                self.progress.emit(&ProgressEvent::StackEventObserved(event));
            }
            if let Some(newest) = fresh.last() {
                last_seen = Some(newest.event_id.clone());
            }

            started = started
                || stack.is_in_progress()
                || fresh
                    .iter()
                    .any(|e| e.client_token.as_deref() == Some(client_token));

            if started && !stack.is_in_progress() {
                return Ok(self.converged(stack));
            }

            if started {
                debug!("Stack {stack_name} is {}", stack.status);
            } else {
                debug!(
                    "Stack {stack_name} still reports {} from before execution",
                    stack.status
                );
            }
        }
    }

    /// Fetches events newer than both `last_seen` and `floor`, oldest first.
    async fn new_events(
        &self,
        stack_name: &str,
        floor: DateTime<Utc>,
        last_seen: Option<&str>,
    ) -> Result<Vec<StackEvent>> {
        let mut fresh = Vec::new();
        let mut next_token = None;

        'pages: loop {
            let page = self.api.describe_stack_events(stack_name, next_token).await?;

            for event in page.events {
                if last_seen == Some(event.event_id.as_str()) || event.timestamp < floor {
                    break 'pages;
                }
                fresh.push(event);
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        // Pages arrive newest first.
        fresh.reverse();
        Ok(fresh)
    }

    fn converged(&self, stack: Stack) -> Convergence {
        let success = is_success(&stack.status);
        let convergence = Convergence { stack, success };

        if success {
            info!("Stack {} reached {}", convergence.stack.name, convergence.status());
        } else {
            warn!(
                "Stack {} reached {}: {}",
                convergence.stack.name,
                convergence.status(),
                convergence.reason().unwrap_or("no reason given")
            );
        }

        self.progress.emit(&ProgressEvent::StackConverged {
            stack_name: &convergence.stack.name,
            status: convergence.status(),
            reason: convergence.reason(),
            success,
        });
        convergence
    }
}

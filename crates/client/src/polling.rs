//! Bounded status polling.
//!
//! A poll loop fetches the run status, hands every status (including the terminal one) to a
//! callback, and pauses between fetches. The pause wakes early when the cancellation token fires.

use std::time::{Duration, Instant};

use chrono::Local;
use flowsmith_types::{FlowRun, RunStatus};
use flowsmith_util::block_on_future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ClientError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Limits on how long a run is polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollBudget {
    pub interval: Duration,
    /// Total time allowed before giving up with [`ClientError::PollTimeout`].
    pub deadline: Option<Duration>,
    pub max_polls: Option<u32>,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
            max_polls: None,
        }
    }
}

impl PollBudget {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }
}

/// Default status callback: log `ACTIVE` statuses with their description.
pub fn log_active_status(run: &FlowRun) {
    if run.status == RunStatus::Active {
        info!(
            action_id = %run.action_id,
            at = %Local::now().format("%H:%M:%S"),
            description = run.description().unwrap_or_default(),
            "[{}]",
            run.status
        );
    }
}

/// Fetch statuses until one is terminal or the budget is spent.
pub fn poll_until_terminal<F, C>(
    action_id: &str,
    budget: &PollBudget,
    cancel: &CancellationToken,
    mut fetch: F,
    mut on_status: C,
) -> Result<FlowRun, ClientError>
where
    F: FnMut() -> Result<FlowRun, ClientError>,
    C: FnMut(&FlowRun),
{
    let started = Instant::now();
    let mut polls: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::PollCancelled {
                action_id: action_id.to_string(),
            });
        }

        let run = fetch()?;
        polls += 1;
        on_status(&run);
        if run.status.is_terminal() {
            debug!(action_id, polls, status = %run.status, "run finished");
            return Ok(run);
        }

        let timed_out = || ClientError::PollTimeout {
            action_id: action_id.to_string(),
            polls,
        };
        if budget.max_polls.is_some_and(|max| polls >= max) {
            return Err(timed_out());
        }
        let pause = match budget.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(timed_out());
                }
                remaining.min(budget.interval)
            }
            None => budget.interval,
        };

        if sleep_or_cancel(pause, cancel)? {
            return Err(ClientError::PollCancelled {
                action_id: action_id.to_string(),
            });
        }
    }
}

/// Sleep for `duration`. Returns `true` when woken by cancellation.
fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<bool, ClientError> {
    let cancel = cancel.clone();
    block_on_future(async move {
        tokio::select! {
            _ = cancel.cancelled() => Ok::<_, std::io::Error>(true),
            _ = tokio::time::sleep(duration) => Ok(false),
        }
    })
    .map_err(ClientError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn statuses(values: &[RunStatus]) -> VecDeque<FlowRun> {
        values.iter().map(|status| FlowRun::new("run-1", status.clone())).collect()
    }

    #[test]
    fn delivers_every_status_until_terminal() {
        let mut pending = statuses(&[RunStatus::Active, RunStatus::Other("INACTIVE".into()), RunStatus::Succeeded]);
        let mut seen = Vec::new();
        let budget = PollBudget::default().with_interval(Duration::from_millis(1));

        let run = poll_until_terminal(
            "run-1",
            &budget,
            &CancellationToken::new(),
            || Ok(pending.pop_front().expect("status available")),
            |run| seen.push(run.status.clone()),
        )
        .unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn max_polls_bounds_the_loop() {
        let budget = PollBudget::default().with_interval(Duration::from_millis(1)).with_max_polls(2);
        let error = poll_until_terminal(
            "run-1",
            &budget,
            &CancellationToken::new(),
            || Ok(FlowRun::new("run-1", RunStatus::Active)),
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(error, ClientError::PollTimeout { polls: 2, .. }));
    }

    #[test]
    fn deadline_bounds_the_loop() {
        let budget = PollBudget::default().with_interval(Duration::from_millis(5)).with_deadline(Duration::from_millis(20));
        let error = poll_until_terminal(
            "run-1",
            &budget,
            &CancellationToken::new(),
            || Ok(FlowRun::new("run-1", RunStatus::Active)),
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(error, ClientError::PollTimeout { .. }));
    }

    #[test]
    fn cancellation_stops_polling() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut fetches = 0;
        let error = poll_until_terminal(
            "run-1",
            &PollBudget::default(),
            &cancel,
            || {
                fetches += 1;
                Ok(FlowRun::new("run-1", RunStatus::Active))
            },
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(error, ClientError::PollCancelled { .. }));
        assert_eq!(fetches, 0);
    }

    #[test]
    fn cancellation_interrupts_a_pause() {
        let cancel = CancellationToken::new();
        let budget = PollBudget::default().with_interval(Duration::from_secs(60));
        let trigger = cancel.clone();
        let started = Instant::now();
        let error = poll_until_terminal(
            "run-1",
            &budget,
            &cancel,
            || Ok(FlowRun::new("run-1", RunStatus::Active)),
            |_| trigger.cancel(),
        )
        .unwrap_err();
        assert!(matches!(error, ClientError::PollCancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}

/* Last-activity bookkeeping for the mode controller. */

use std::time::Duration;

use tokio::time::Instant;

/* Timestamp of the most recent qualifying input.
 *
 * `None` means nothing has been observed since the controller was last
 * enabled. Recorded time never moves backwards, so late or duplicate
 * notifications from a slower source are harmless. */
#[derive(Debug, Default)]
pub struct ActivityTracker {
    last_activity: Option<Instant>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /* Record activity at `at` and return the effective last-activity time. */
    pub fn record(&mut self, at: Instant) -> Instant {
        let latest = match self.last_activity {
            Some(current) => current.max(at),
            None => at,
        };
        self.last_activity = Some(latest);
        latest
    }

    /* Time elapsed between the last activity and `now`, or `None` if no
     * activity has been recorded yet. Activity stamped after `now` counts
     * as zero elapsed time. */
    pub fn time_since(&self, now: Instant) -> Option<Duration> {
        self.last_activity
            .map(|last| now.saturating_duration_since(last))
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    pub fn is_live(&self) -> bool {
        self.last_activity.is_some()
    }

    /* Forget all activity, e.g. when the controller is disabled. */
    pub fn reset(&mut self) {
        self.last_activity = None;
    }
}

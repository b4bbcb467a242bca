/* The single deferred re-evaluation of the mode controller.
 *
 * A `Scheduler` holds at most one pending deadline. Arming replaces any
 * earlier deadline and disarming drops it. The owner awaits `expiry()` in
 * the same task that processes every other controller event, which gives
 * cancellation its synchronous guarantee: once `cancel()` has returned, the
 * expired branch for the old deadline can no longer be taken. */

use std::future::Future;

use tokio::time::{self, Instant};
use tracing::trace;

#[derive(Debug, Default)]
pub struct Scheduler {
    deadline: Option<Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /* Replace the pending deadline. `None` disarms. */
    pub fn arm(&mut self, deadline: Option<Instant>) {
        if let Some(previous) = self.deadline {
            if Some(previous) != deadline {
                trace!("Superseding re-evaluation due at {previous:?}");
            }
        }
        self.deadline = deadline;
    }

    pub fn cancel(&mut self) {
        self.arm(None);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /* Consume the pending deadline once its expiry has been observed. */
    pub fn take(&mut self) -> Option<Instant> {
        self.deadline.take()
    }

    /* A future resolving once the currently armed deadline passes; it never
     * resolves while disarmed. It does not borrow the scheduler, so it can be
     * raced against other events and simply rebuilt after each of them. */
    pub fn expiry(&self) -> impl Future<Output = Instant> + Send + 'static {
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(at) => {
                    time::sleep_until(at).await;
                    at
                }
                None => std::future::pending().await,
            }
        }
    }
}

/* Display power states and the pure transition table between them.
 *
 *   Active --(dim_timeout)--> Dimmed --(idle_timeout)--> Idle
 *
 * Both boundaries use `>=`, so a zero `dim_timeout` makes the dimmed phase
 * start at the very instant of activity. Returning to `Active` is not part
 * of this table: the controller forces it on every recorded activity. */

use std::fmt;
use std::time::Duration;

use crate::config::Config;

/* Ordered from least to most active, so `Idle < Dimmed < Active`. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Idle,
    Dimmed,
    Active,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dimmed => "dimmed",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* Outcome of one evaluation: the mode to show and how long until the
 * next transition could become due (`None` once idle). */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub mode: Mode,
    pub next_deadline: Option<Duration>,
}

/* Compute the mode for the given inactivity period.
 *
 * `since_activity` is `None` when no activity has been seen since the
 * controller was enabled; that counts as a full idle timeout so the strip
 * stays dark until the first input arrives. The previous mode is not an
 * input: the result depends only on elapsed time and configuration. */
pub fn evaluate(since_activity: Option<Duration>, config: &Config) -> Evaluation {
    let elapsed = since_activity.unwrap_or(config.idle_timeout);

    if elapsed >= config.idle_timeout {
        Evaluation {
            mode: Mode::Idle,
            next_deadline: None,
        }
    } else if elapsed >= config.dim_timeout {
        Evaluation {
            mode: Mode::Dimmed,
            next_deadline: Some(config.idle_timeout - elapsed),
        }
    } else {
        Evaluation {
            mode: Mode::Active,
            next_deadline: Some(config.dim_timeout - elapsed),
        }
    }
}

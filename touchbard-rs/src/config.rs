/* Runtime tunables of the touch bar: idle/dim timeouts and function-key mode.
 *
 * The `ConfigStore` is owned by the mode controller task, so every read is a
 * consistent snapshot and every write is serialized with activity and timer
 * handling. Writes take effect at the next re-evaluation; nothing is pushed
 * to the state machine from here. */

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ControllerError;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_DIM_TIMEOUT: Duration = Duration::from_secs(5);

/* Largest accepted timeout, in seconds. */
const MAX_TIMEOUT_SECS: i64 = u32::MAX as i64;

/* What the top physical key row reports when Fn is not held. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum FnMode {
    /* Media and system special keys. */
    #[default]
    Normal = 0,
    /* Literal F1..F12. */
    FKeys = 1,
}

impl FnMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::FKeys => "fkeys",
        }
    }
}

impl fmt::Display for FnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for FnMode {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::FKeys),
            other => Err(other),
        }
    }
}

/* A consistent snapshot of every tunable.
 *
 * `dim_timeout` is meant to be shorter than `idle_timeout`. This is not
 * enforced: when `dim_timeout >= idle_timeout` the dimmed phase is simply
 * never observed because the idle check wins. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub idle_timeout: Duration,
    pub dim_timeout: Duration,
    pub fn_mode: FnMode,
    pub default_fn_mode: FnMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            dim_timeout: DEFAULT_DIM_TIMEOUT,
            fn_mode: FnMode::default(),
            default_fn_mode: FnMode::default(),
        }
    }
}

/* Names of the individually settable tunables. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    IdleTimeout,
    DimTimeout,
    FnMode,
    DefaultFnMode,
}

impl ConfigField {
    pub const ALL: [ConfigField; 4] = [
        Self::IdleTimeout,
        Self::DimTimeout,
        Self::FnMode,
        Self::DefaultFnMode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdleTimeout => "idle_timeout",
            Self::DimTimeout => "dim_timeout",
            Self::FnMode => "fnmode",
            Self::DefaultFnMode => "default_fnmode",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown setting '{s}'"))
    }
}

/* Validating storage for `Config`. */
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: Config,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn get(&self) -> Config {
        self.config
    }

    /* Validate and store one field. On error the previous value is kept.
     * Returns whether the stored value changed. */
    pub fn set(&mut self, field: ConfigField, value: i64) -> Result<bool, ControllerError> {
        let invalid = || ControllerError::InvalidArgument { field, value };
        let before = self.config;

        match field {
            ConfigField::IdleTimeout => {
                self.config.idle_timeout = timeout_from_secs(value).ok_or_else(invalid)?;
            }
            ConfigField::DimTimeout => {
                self.config.dim_timeout = timeout_from_secs(value).ok_or_else(invalid)?;
            }
            ConfigField::FnMode => {
                self.config.fn_mode = FnMode::try_from(value).map_err(|_| invalid())?;
            }
            ConfigField::DefaultFnMode => {
                self.config.default_fn_mode = FnMode::try_from(value).map_err(|_| invalid())?;
            }
        }

        Ok(self.config != before)
    }

    pub fn set_fn_mode(&mut self, mode: FnMode) -> bool {
        let changed = self.config.fn_mode != mode;
        self.config.fn_mode = mode;
        changed
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn timeout_from_secs(value: i64) -> Option<Duration> {
    if (0..=MAX_TIMEOUT_SECS).contains(&value) {
        Some(Duration::from_secs(value as u64))
    } else {
        None
    }
}

use tokio::time::Instant;
use zbus::{fdo, interface};

use crate::config::{ConfigField, FnMode};
use crate::controller::ControllerHandle;
use crate::keymap;

/* DBus API version. */
pub const API_VERSION: i32 = 1;

/* The org.freedesktop.touchbar1.Controller interface.
 *
 * Exposes the tunables and lifecycle of the touch bar mode controller. */
pub struct TouchbarController {
    controller: ControllerHandle,
}

impl TouchbarController {
    pub fn new(controller: ControllerHandle) -> Self {
        Self { controller }
    }
}

#[interface(name = "org.freedesktop.touchbar1.Controller")]
impl TouchbarController {
    /* The DBus API version (constant, read-only). */
    #[zbus(property)]
    async fn api_version(&self) -> i32 {
        API_VERSION
    }

    /* True while the controller tracks activity. */
    #[zbus(property)]
    async fn enabled(&self) -> fdo::Result<bool> {
        Ok(self.controller.status().await?.enabled)
    }

    /* Current display mode: active, dimmed, idle or unknown. */
    #[zbus(property)]
    async fn mode(&self) -> fdo::Result<String> {
        let status = self.controller.status().await?;
        Ok(status.mode.map_or("unknown", |m| m.as_str()).to_string())
    }

    /* Idle timeout in seconds. */
    #[zbus(property)]
    async fn idle_timeout(&self) -> fdo::Result<u32> {
        let config = self.controller.config().await?;
        Ok(config.idle_timeout.as_secs() as u32)
    }

    /* Dim timeout in seconds. */
    #[zbus(property)]
    async fn dim_timeout(&self) -> fdo::Result<u32> {
        let config = self.controller.config().await?;
        Ok(config.dim_timeout.as_secs() as u32)
    }

    /* 0 = special keys, 1 = F-keys. */
    #[zbus(property)]
    async fn fn_mode(&self) -> fdo::Result<u32> {
        Ok(self.controller.config().await?.fn_mode as u32)
    }

    #[zbus(property)]
    async fn default_fn_mode(&self) -> fdo::Result<u32> {
        Ok(self.controller.config().await?.default_fn_mode as u32)
    }

    /* Key codes the top row currently reports without Fn held. */
    #[zbus(property)]
    async fn top_row_keys(&self) -> fdo::Result<Vec<u32>> {
        let fn_mode = self.controller.config().await?.fn_mode;
        Ok(keymap::top_row(fn_mode, false)
            .iter()
            .map(|&code| u32::from(code))
            .collect())
    }

    /* Seconds since the last recorded activity, -1 if none. */
    #[zbus(property)]
    async fn seconds_since_activity(&self) -> fdo::Result<i64> {
        let status = self.controller.status().await?;
        Ok(status
            .last_activity
            .map_or(-1, |at| at.elapsed().as_secs() as i64))
    }

    /* Seconds until the pending re-evaluation, -1 if none is armed. */
    #[zbus(property)]
    async fn next_evaluation(&self) -> fdo::Result<i64> {
        let status = self.controller.status().await?;
        Ok(status.deadline.map_or(-1, |deadline| {
            deadline.saturating_duration_since(Instant::now()).as_secs() as i64
        }))
    }

    /* Start tracking activity. Returns the resulting mode. */
    async fn enable(&self) -> fdo::Result<String> {
        let mode = self.controller.enable().await?;
        Ok(mode.to_string())
    }

    async fn disable(&self) -> fdo::Result<()> {
        Ok(self.controller.disable().await?)
    }

    /* Report user activity happening now. */
    async fn notify_activity(&self) -> fdo::Result<()> {
        Ok(self.controller.report_activity(Instant::now()).await?)
    }

    async fn set_fn_mode(&self, mode: u32) -> fdo::Result<()> {
        let mode = FnMode::try_from(i64::from(mode))
            .map_err(|v| fdo::Error::InvalidArgs(format!("Invalid function-key mode {v}")))?;
        Ok(self.controller.set_function_key_mode(mode).await?)
    }

    /* Set one tunable by name (idle_timeout, dim_timeout, fnmode, default_fnmode). */
    async fn set(&self, field: String, value: i64) -> fdo::Result<()> {
        let field: ConfigField = field.parse().map_err(fdo::Error::InvalidArgs)?;
        Ok(self.controller.set_config(field, value).await?)
    }

    /* Translate a top-row key code for the current mode. Returns 0 for keys
     * outside the top row. */
    async fn remap_key(&self, code: u32, fn_held: bool) -> fdo::Result<u32> {
        let fn_mode = self.controller.config().await?.fn_mode;
        let remapped = u16::try_from(code)
            .ok()
            .and_then(|code| keymap::remap_key(code, fn_mode, fn_held));
        Ok(remapped.map_or(0, u32::from))
    }
}

/* touchbarctl DBus client: thin wrapper over the org.freedesktop.touchbar1 API, covering
 * property reads and method calls on the controller object. */
//! Low-level DBus client for `org.freedesktop.touchbar1`.
//!
//! All communication with the daemon goes through this module.

use anyhow::{Context, Result, anyhow};
use zbus::Connection;
use zbus::zvariant::{OwnedValue, Value};

const BUS_NAME: &str = "org.freedesktop.touchbar1";
const CONTROLLER_PATH: &str = "/org/freedesktop/touchbar1";
const CONTROLLER_IFACE: &str = "org.freedesktop.touchbar1.Controller";

/// A client that talks to the `touchbard` daemon.
pub struct TouchbarClient {
    conn: Connection,
}

impl TouchbarClient {
    /// Connect to the system bus, or the session bus when `session` is set.
    pub async fn connect(session: bool) -> Result<Self> {
        let conn = if session {
            Connection::session()
                .await
                .context("Cannot connect to the session DBus")?
        } else {
            Connection::system()
                .await
                .context("Cannot connect to the system DBus")?
        };
        Ok(Self { conn })
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub async fn get_api_version(&self) -> Result<i32> {
        self.get_i32_property("ApiVersion").await
    }

    pub async fn get_enabled(&self) -> Result<bool> {
        self.get_bool_property("Enabled").await
    }

    pub async fn get_mode(&self) -> Result<String> {
        self.get_string_property("Mode").await
    }

    pub async fn get_idle_timeout(&self) -> Result<u32> {
        self.get_u32_property("IdleTimeout").await
    }

    pub async fn get_dim_timeout(&self) -> Result<u32> {
        self.get_u32_property("DimTimeout").await
    }

    pub async fn get_fn_mode(&self) -> Result<u32> {
        self.get_u32_property("FnMode").await
    }

    pub async fn get_default_fn_mode(&self) -> Result<u32> {
        self.get_u32_property("DefaultFnMode").await
    }

    /// Seconds since the last activity, `None` if nothing was recorded.
    pub async fn get_seconds_since_activity(&self) -> Result<Option<u64>> {
        let secs = self.get_i64_property("SecondsSinceActivity").await?;
        Ok(u64::try_from(secs).ok())
    }

    /// Seconds until the next re-evaluation, `None` if none is pending.
    pub async fn get_next_evaluation(&self) -> Result<Option<u64>> {
        let secs = self.get_i64_property("NextEvaluation").await?;
        Ok(u64::try_from(secs).ok())
    }

    pub async fn get_top_row_keys(&self) -> Result<Vec<u32>> {
        let val = self.get_property("TopRowKeys").await?;
        extract_u32_array(val).context("Failed to parse TopRowKeys property")
    }

    // -----------------------------------------------------------------------
    // Methods
    // -----------------------------------------------------------------------

    /// Start tracking activity; returns the resulting mode.
    pub async fn enable(&self) -> Result<String> {
        let reply = self
            .conn
            .call_method(Some(BUS_NAME), CONTROLLER_PATH, Some(CONTROLLER_IFACE), "Enable", &())
            .await
            .context("Enable call failed")?;
        let mode: String = reply.body().deserialize()?;
        Ok(mode)
    }

    pub async fn disable(&self) -> Result<()> {
        self.conn
            .call_method(Some(BUS_NAME), CONTROLLER_PATH, Some(CONTROLLER_IFACE), "Disable", &())
            .await
            .context("Disable call failed")?;
        Ok(())
    }

    pub async fn notify_activity(&self) -> Result<()> {
        self.conn
            .call_method(Some(BUS_NAME), CONTROLLER_PATH, Some(CONTROLLER_IFACE), "NotifyActivity", &())
            .await
            .context("NotifyActivity call failed")?;
        Ok(())
    }

    pub async fn set_fn_mode(&self, mode: u32) -> Result<()> {
        self.conn
            .call_method(Some(BUS_NAME), CONTROLLER_PATH, Some(CONTROLLER_IFACE), "SetFnMode", &(mode,))
            .await
            .context("SetFnMode call failed")?;
        Ok(())
    }

    /// Set a tunable by name (`idle_timeout`, `dim_timeout`, `fnmode`, `default_fnmode`).
    pub async fn set(&self, field: &str, value: i64) -> Result<()> {
        self.conn
            .call_method(Some(BUS_NAME), CONTROLLER_PATH, Some(CONTROLLER_IFACE), "Set", &(field, value))
            .await
            .context("Set call failed")?;
        Ok(())
    }

    /// Remap a top-row key; `None` if the key is not on the top row.
    pub async fn remap_key(&self, code: u32, fn_held: bool) -> Result<Option<u32>> {
        let reply = self
            .conn
            .call_method(Some(BUS_NAME), CONTROLLER_PATH, Some(CONTROLLER_IFACE), "RemapKey", &(code, fn_held))
            .await
            .context("RemapKey call failed")?;
        let remapped: u32 = reply.body().deserialize()?;
        Ok((remapped != 0).then_some(remapped))
    }

    // -----------------------------------------------------------------------
    // Generic helpers
    // -----------------------------------------------------------------------

    async fn get_property(&self, prop: &str) -> Result<OwnedValue> {
        let reply = self
            .conn
            .call_method(
                Some(BUS_NAME),
                CONTROLLER_PATH,
                Some("org.freedesktop.DBus.Properties"),
                "Get",
                &(CONTROLLER_IFACE, prop),
            )
            .await
            .with_context(|| format!("Get {}.{} failed", CONTROLLER_IFACE, prop))?;
        let val: OwnedValue = reply.body().deserialize()?;
        Ok(val)
    }

    async fn get_string_property(&self, prop: &str) -> Result<String> {
        let val = self.get_property(prop).await?;
        val.downcast_ref::<String>()
            .with_context(|| format!("Type mismatch for {}.{}", CONTROLLER_IFACE, prop))
    }

    async fn get_u32_property(&self, prop: &str) -> Result<u32> {
        let val = self.get_property(prop).await?;
        val.downcast_ref::<u32>()
            .with_context(|| format!("Type mismatch for {}.{}", CONTROLLER_IFACE, prop))
    }

    async fn get_i32_property(&self, prop: &str) -> Result<i32> {
        let val = self.get_property(prop).await?;
        val.downcast_ref::<i32>()
            .with_context(|| format!("Type mismatch for {}.{}", CONTROLLER_IFACE, prop))
    }

    async fn get_i64_property(&self, prop: &str) -> Result<i64> {
        let val = self.get_property(prop).await?;
        val.downcast_ref::<i64>()
            .with_context(|| format!("Type mismatch for {}.{}", CONTROLLER_IFACE, prop))
    }

    async fn get_bool_property(&self, prop: &str) -> Result<bool> {
        let val = self.get_property(prop).await?;
        val.downcast_ref::<bool>()
            .with_context(|| format!("Type mismatch for {}.{}", CONTROLLER_IFACE, prop))
    }
}

// ---------------------------------------------------------------------------
// Free-standing helpers for extracting arrays from OwnedValue
// ---------------------------------------------------------------------------

/// Extract a `Vec<u32>` from an `OwnedValue` that wraps an array of u32.
fn extract_u32_array(val: OwnedValue) -> Result<Vec<u32>> {
    let inner: Value<'_> = val.into();
    match inner {
        Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for value in arr.iter() {
                if let Value::U32(number) = value {
                    out.push(*number);
                } else {
                    return Err(anyhow!("Array contains non-u32 value"));
                }
            }
            Ok(out)
        }
        _ => Err(anyhow!("Value is not an array of u32")),
    }
}

/* touchbarctl CLI: clap-driven client that talks to touchbard over DBus to inspect the touch bar
 * mode, toggle activity tracking, tune timeouts and switch the function-key mode. */
mod dbus_client;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use dbus_client::TouchbarClient;

/// touchbarctl: inspect and configure the touchbard DBus daemon.
#[derive(Parser)]
#[command(name = "touchbarctl", version, about)]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus.
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current mode, timeouts and function-key mode.
    Status,

    /// Start activity tracking.
    Enable,

    /// Stop activity tracking.
    Disable,

    /// Report user activity now.
    Activity,

    /// Set a tunable.
    Set {
        /// One of: idle_timeout, dim_timeout, fnmode, default_fnmode.
        field: String,
        /// New value (seconds for timeouts, 0 or 1 for function-key modes).
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Switch what the top key row reports.
    #[command(name = "fn-mode")]
    FnMode {
        /// normal (special keys) or fkeys (F1..F12).
        mode: String,
    },

    /// List the key codes the top row currently reports.
    Keys {
        /// Show the row as reported while Fn is held.
        #[arg(long)]
        fn_held: bool,
    },

    /// Translate one top-row key code for the current mode.
    Remap {
        /// Linux key code of the physical key (e.g. 59 for F1).
        code: u32,
        /// Translate as if Fn were held.
        #[arg(long)]
        fn_held: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = TouchbarClient::connect(cli.session)
        .await
        .context("Failed to connect to touchbard on org.freedesktop.touchbar1")?;

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::Enable => cmd_enable(&client).await,
        Commands::Disable => cmd_disable(&client).await,
        Commands::Activity => cmd_activity(&client).await,
        Commands::Set { field, value } => cmd_set(&client, &field, value).await,
        Commands::FnMode { mode } => cmd_fn_mode(&client, &mode).await,
        Commands::Keys { fn_held } => cmd_keys(&client, fn_held).await,
        Commands::Remap { code, fn_held } => cmd_remap(&client, code, fn_held).await,
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_status(client: &TouchbarClient) -> Result<()> {
    let api = client.get_api_version().await.unwrap_or(-1);
    let enabled = client.get_enabled().await?;
    let mode = client.get_mode().await?;
    let idle = client.get_idle_timeout().await?;
    let dim = client.get_dim_timeout().await?;
    let fn_mode = client.get_fn_mode().await?;
    let default_fn_mode = client.get_default_fn_mode().await?;

    println!("API version:     {}", api);
    println!("Enabled:         {}", if enabled { "yes" } else { "no" });
    println!("Mode:            {}", mode);
    println!("Idle timeout:    {}s", idle);
    println!("Dim timeout:     {}s", dim);
    println!("Fn mode:         {}", fn_mode_name(fn_mode));
    println!("Default Fn mode: {}", fn_mode_name(default_fn_mode));

    if let Some(secs) = client.get_seconds_since_activity().await? {
        println!("Last activity:   {}s ago", secs);
    }
    if let Some(secs) = client.get_next_evaluation().await? {
        println!("Next change:     in {}s", secs);
    }
    Ok(())
}

async fn cmd_enable(client: &TouchbarClient) -> Result<()> {
    let mode = client.enable().await?;
    println!("Activity tracking enabled, touch bar is {}.", mode);
    Ok(())
}

async fn cmd_disable(client: &TouchbarClient) -> Result<()> {
    client.disable().await?;
    println!("Activity tracking disabled.");
    Ok(())
}

async fn cmd_activity(client: &TouchbarClient) -> Result<()> {
    client.notify_activity().await?;
    let mode = client.get_mode().await?;
    println!("Activity reported, touch bar is {}.", mode);
    Ok(())
}

async fn cmd_set(client: &TouchbarClient, field: &str, value: i64) -> Result<()> {
    client.set(field, value).await?;
    println!("{} set to {}.", field, value);
    Ok(())
}

async fn cmd_fn_mode(client: &TouchbarClient, mode: &str) -> Result<()> {
    let value = parse_fn_mode(mode)?;
    client.set_fn_mode(value).await?;
    println!("Function-key mode set to {}.", fn_mode_name(value));
    Ok(())
}

async fn cmd_keys(client: &TouchbarClient, fn_held: bool) -> Result<()> {
    let keys = if fn_held {
        // The daemon only publishes the row without Fn; translate each key.
        let mut row = Vec::with_capacity(TOP_ROW.len());
        for &code in TOP_ROW {
            row.push(client.remap_key(code, true).await?.unwrap_or(code));
        }
        row
    } else {
        client.get_top_row_keys().await?
    };

    for (position, (physical, code)) in TOP_ROW.iter().zip(&keys).enumerate() {
        println!(
            "{:2}: {:<4} -> {} ({})",
            position,
            key_name(*physical),
            key_name(*code),
            code
        );
    }
    Ok(())
}

async fn cmd_remap(client: &TouchbarClient, code: u32, fn_held: bool) -> Result<()> {
    match client.remap_key(code, fn_held).await? {
        Some(remapped) => println!("{} -> {} ({})", key_name(code), key_name(remapped), remapped),
        None => println!("Key {} is not on the top row.", code),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Physical key codes of the top row, left to right.
const TOP_ROW: &[u32] = &[59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 87, 88, 1];

/// Parse a function-key mode given by name or number.
fn parse_fn_mode(s: &str) -> Result<u32> {
    match s.to_ascii_lowercase().as_str() {
        "normal" | "special" | "0" => Ok(0),
        "fkeys" | "f-keys" | "1" => Ok(1),
        other => anyhow::bail!("Unknown function-key mode '{}'. Use normal or fkeys", other),
    }
}

fn fn_mode_name(value: u32) -> &'static str {
    match value {
        0 => "normal",
        1 => "fkeys",
        _ => "unknown",
    }
}

/// Human-readable name for the key codes the top row can produce.
fn key_name(code: u32) -> &'static str {
    match code {
        1 => "Esc",
        59 => "F1",
        60 => "F2",
        61 => "F3",
        62 => "F4",
        63 => "F5",
        64 => "F6",
        65 => "F7",
        66 => "F8",
        67 => "F9",
        68 => "F10",
        87 => "F11",
        88 => "F12",
        113 => "Mute",
        114 => "VolumeDown",
        115 => "VolumeUp",
        116 => "Power",
        161 => "Eject",
        163 => "NextSong",
        164 => "PlayPause",
        165 => "PreviousSong",
        229 => "KbdIllumDown",
        230 => "KbdIllumUp",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fn_mode() {
        assert_eq!(parse_fn_mode("normal").unwrap(), 0);
        assert_eq!(parse_fn_mode("FKeys").unwrap(), 1);
        assert_eq!(parse_fn_mode("1").unwrap(), 1);
        assert!(parse_fn_mode("media").is_err());
    }

    #[test]
    fn test_top_row_names() {
        let names: Vec<_> = TOP_ROW.iter().map(|&code| key_name(code)).collect();
        assert_eq!(names.first(), Some(&"F1"));
        assert_eq!(names.last(), Some(&"Esc"));
        assert!(!names.contains(&"?"));
    }

    #[test]
    fn test_cli_parses_set() {
        let cli = Cli::try_parse_from(["touchbarctl", "set", "dim_timeout", "10"]).unwrap();
        assert!(matches!(cli.command, Commands::Set { ref field, value: 10 } if field == "dim_timeout"));
    }
}

/* Daemon settings file.
 *
 * A small INI file, every key optional:
 *
 *   [Touchbar]
 *   IdleTimeout=60
 *   DimTimeout=5
 *   FnMode=0
 *   DefaultFnMode=0
 *
 *   [Device]
 *   Hidraw=/dev/hidraw2
 *   ModeReportId=1
 *   DisplayReportId=2
 *   Inputs=/dev/input/event3, /dev/input/event4
 *
 * Tunables are validated by `ConfigStore` exactly like runtime writes; a
 * bad value is logged and the default kept. */

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use configparser::ini::Ini;
use tracing::{debug, warn};

use crate::config::{Config, ConfigField, ConfigStore};
use crate::transport::ibridge::ReportIds;

pub const DEFAULT_SETTINGS_PATH: &str = "/etc/touchbard/touchbard.conf";

const TOUCHBAR_SECTION: &str = "touchbar";
const DEVICE_SECTION: &str = "device";

/* Everything the daemon reads at startup. */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub touchbar: Config,
    pub hidraw: Option<PathBuf>,
    pub report_ids: ReportIds,
    pub inputs: Vec<PathBuf>,
}

/* Load settings from `path`. A missing file yields the defaults. */
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        warn!("Settings file {} not found, using defaults", path.display());
        return Ok(Settings::default());
    }

    let mut ini = Ini::new();
    ini.load(path)
        .map_err(|e| anyhow!("INI parse error in {}: {}", path.display(), e))?;

    let settings = parse_settings(&ini);
    debug!("Loaded settings from {}: {:?}", path.display(), settings);
    Ok(settings)
}

fn parse_settings(ini: &Ini) -> Settings {
    Settings {
        touchbar: parse_touchbar_section(ini),
        hidraw: ini
            .get(DEVICE_SECTION, "hidraw")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        report_ids: parse_report_ids(ini),
        inputs: ini
            .get(DEVICE_SECTION, "inputs")
            .map(|s| parse_input_list(&s))
            .unwrap_or_default(),
    }
}

/* Apply every `[Touchbar]` key on top of the defaults. The live
 * function-key mode follows `DefaultFnMode` unless `FnMode` overrides it
 * for this run. */
fn parse_touchbar_section(ini: &Ini) -> Config {
    let mut store = ConfigStore::default();
    apply_key(ini, &mut store, "idletimeout", ConfigField::IdleTimeout);
    apply_key(ini, &mut store, "dimtimeout", ConfigField::DimTimeout);
    apply_key(ini, &mut store, "defaultfnmode", ConfigField::DefaultFnMode);

    let default_fn_mode = store.get().default_fn_mode;
    store.set_fn_mode(default_fn_mode);
    apply_key(ini, &mut store, "fnmode", ConfigField::FnMode);

    store.get()
}

fn apply_key(ini: &Ini, store: &mut ConfigStore, key: &str, field: ConfigField) {
    let Some(raw) = ini.get(TOUCHBAR_SECTION, key) else {
        return;
    };
    match raw.trim().parse::<i64>() {
        Ok(value) => {
            if let Err(e) = store.set(field, value) {
                warn!("Ignoring [Touchbar] {key}: {e}");
            }
        }
        Err(e) => warn!("Ignoring [Touchbar] {key}='{raw}': {e}"),
    }
}

fn parse_report_ids(ini: &Ini) -> ReportIds {
    let mut ids = ReportIds::default();
    if let Some(id) = parse_report_id(ini, "modereportid") {
        ids.mode = id;
    }
    if let Some(id) = parse_report_id(ini, "displayreportid") {
        ids.display = id;
    }
    ids
}

/* Accepts decimal or `0x`-prefixed hex. */
fn parse_report_id(ini: &Ini, key: &str) -> Option<u8> {
    let raw = ini.get(DEVICE_SECTION, key)?;
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse(),
    };

    match parsed {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Ignoring [Device] {key}='{raw}': {e}");
            None
        }
    }
}

/* Parse a comma-separated list of evdev paths. */
fn parse_input_list(s: &str) -> Vec<PathBuf> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

/* Touch bar transport over a hidraw node.
 *
 * Display brightness and key-row mode are each controlled by a two-byte
 * HID feature report: `[report_id, value]`. */

use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::FnMode;
use crate::mode::Mode;
use crate::transport::Transport;

pub const DEFAULT_MODE_REPORT_ID: u8 = 0x01;
pub const DEFAULT_DISPLAY_REPORT_ID: u8 = 0x02;

/* Display report values */
const DISP_ON: u8 = 0x01;
const DISP_DIM: u8 = 0x02;
const DISP_OFF: u8 = 0x04;

/* Key-row mode report values */
const KEYS_FN: u8 = 0x01;
const KEYS_SPECIAL: u8 = 0x02;

nix::ioctl_readwrite_buf!(hid_set_feature, b'H', 0x06, u8);

/* Report IDs used by a particular touch bar. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportIds {
    pub mode: u8,
    pub display: u8,
}

impl Default for ReportIds {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE_REPORT_ID,
            display: DEFAULT_DISPLAY_REPORT_ID,
        }
    }
}

/* Async wrapper around a `/dev/hidraw` file descriptor. */
pub struct DeviceIo {
    file: tokio::fs::File,
    path: PathBuf,
}

impl DeviceIo {
    /* Open the hidraw device node at `path`. */
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open hidraw device {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /* Send a feature report. The first byte must be the report ID. */
    pub fn set_feature(&mut self, report: &[u8]) -> Result<()> {
        let mut buf = report.to_vec();
        let fd = self.file.as_raw_fd();

        /* SAFETY: `fd` belongs to the open file held by `self`, and `buf` is a
         * live buffer whose length is encoded into the request. */
        unsafe { hid_set_feature(fd, &mut buf) }
            .with_context(|| format!("HIDIOCSFEATURE failed on {}", self.path.display()))?;
        debug!("FEATURE {} bytes: {:02x?}", report.len(), report);
        Ok(())
    }
}

fn display_value(mode: Mode) -> u8 {
    match mode {
        Mode::Active => DISP_ON,
        Mode::Dimmed => DISP_DIM,
        Mode::Idle => DISP_OFF,
    }
}

fn key_mode_value(mode: FnMode) -> u8 {
    match mode {
        FnMode::Normal => KEYS_SPECIAL,
        FnMode::FKeys => KEYS_FN,
    }
}

pub struct IbridgeTransport {
    io: DeviceIo,
    reports: ReportIds,
}

impl IbridgeTransport {
    pub async fn open(path: &Path, reports: ReportIds) -> Result<Self> {
        let io = DeviceIo::open(path).await?;
        Ok(Self { io, reports })
    }
}

#[async_trait]
impl Transport for IbridgeTransport {
    fn name(&self) -> &str {
        "ibridge"
    }

    async fn set_display_mode(&mut self, mode: Mode) -> Result<()> {
        let report = [self.reports.display, display_value(mode)];
        self.io
            .set_feature(&report)
            .with_context(|| format!("Setting display mode {mode}"))
    }

    async fn set_function_key_mapping(&mut self, mode: FnMode) -> Result<()> {
        let report = [self.reports.mode, key_mode_value(mode)];
        self.io
            .set_feature(&report)
            .with_context(|| format!("Setting function-key mode {mode}"))
    }
}

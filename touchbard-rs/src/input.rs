/* Activity source: watches evdev nodes and reports user activity.
 *
 * Each configured `/dev/input/event*` node gets its own reader task driving
 * an evdev event stream. Any key, button, relative or absolute motion event
 * counts as activity; notifications are coalesced so a burst of events
 * produces at most one message per `COALESCE_WINDOW`. */

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use evdev::{Device, EventType, InputEvent};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::controller::ControllerHandle;

const COALESCE_WINDOW: Duration = Duration::from_millis(100);

/* Whether this event indicates the user is present. */
fn is_activity(event: &InputEvent) -> bool {
    matches!(
        event.event_type(),
        EventType::KEY | EventType::RELATIVE | EventType::ABSOLUTE
    )
}

/* Rate limiter for activity notifications from a single source. */
#[derive(Debug, Default)]
struct Coalescer {
    last_sent: Option<Instant>,
}

impl Coalescer {
    fn should_send(&mut self, now: Instant) -> bool {
        let due = self
            .last_sent
            .is_none_or(|last| now.saturating_duration_since(last) >= COALESCE_WINDOW);
        if due {
            self.last_sent = Some(now);
        }
        due
    }
}

async fn read_activity(path: &Path, controller: &ControllerHandle) -> Result<()> {
    let device = Device::open(path)
        .with_context(|| format!("Failed to open input device {}", path.display()))?;

    info!(
        "Watching {} ({}) for activity",
        path.display(),
        device.name().unwrap_or("unnamed")
    );

    let mut events = device
        .into_event_stream()
        .with_context(|| format!("Failed to create event stream for {}", path.display()))?;
    let mut coalescer = Coalescer::default();

    loop {
        let event = events
            .next_event()
            .await
            .with_context(|| format!("Read failed on {}", path.display()))?;

        if is_activity(&event) {
            let now = Instant::now();
            if coalescer.should_send(now) {
                controller.notify_activity(now).await;
            }
        }
    }
}

/* Spawn a reader for one evdev node. A failing reader logs and exits; the
 * controller keeps running on the remaining sources. */
pub fn spawn_activity_reader(path: PathBuf, controller: ControllerHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = read_activity(&path, &controller).await {
            warn!("Activity source stopped: {e:#}");
        }
        debug!("Activity reader for {} exited", path.display());
    })
}

/* The set of running activity readers. */
#[derive(Debug, Default)]
pub struct ActivityReaders {
    readers: Vec<JoinHandle<()>>,
}

impl ActivityReaders {
    pub fn spawn(paths: Vec<PathBuf>, controller: &ControllerHandle) -> Self {
        let readers = paths
            .into_iter()
            .map(|path| spawn_activity_reader(path, controller.clone()))
            .collect();
        Self { readers }
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /* Stop every reader, idle or not, and wait for the tasks to finish. */
    pub async fn shutdown(self) {
        for reader in &self.readers {
            reader.abort();
        }
        for reader in self.readers {
            match reader.await {
                Err(e) if !e.is_cancelled() => warn!("Activity reader failed: {e}"),
                _ => {}
            }
        }
        debug!("Activity readers stopped");
    }
}

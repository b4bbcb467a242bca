/* Mode controller: the activity-driven state machine of the touch bar.
 *
 * A single actor task owns the configuration, the activity record, the
 * pending re-evaluation and the current/applied modes. Activity sources,
 * the DBus surface and lifecycle hooks talk to it through a cloneable
 * `ControllerHandle`; the deferred re-evaluation is just another branch of
 * the actor's event loop. Everything is therefore serialized without a
 * lock, and once `disable()` has returned no timer can fire.
 *
 * Hardware commands are queued to the transport actor and never awaited
 * here. If one fails, the applied value is forgotten so the next state
 * change emits it again. */

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::activity::ActivityTracker;
use crate::actor::{self, TransportHandle};
use crate::config::{Config, ConfigField, ConfigStore, FnMode};
use crate::error::ControllerError;
use crate::mode::{self, Evaluation, Mode};
use crate::scheduler::Scheduler;
use crate::transport::{Transport, TransportCommand, TransportReport};

/* Depth of the controller's inbound message queue. */
const MESSAGE_QUEUE_DEPTH: usize = 64;

/* Consecutive inbound messages handled before a due timer is let through. */
const MESSAGE_BURST: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, ControllerError>>;

/* Commands that activity sources, lifecycle hooks and the DBus surface can
 * send to the controller. */
#[derive(Debug)]
pub enum ControllerMessage {
    Enable {
        reply: Reply<Mode>,
    },
    Disable {
        reply: Reply<()>,
    },
    /* User activity at `at`. Sources that do not care about the outcome
     * leave `reply` empty. */
    Activity {
        at: Instant,
        reply: Option<Reply<()>>,
    },
    SetFunctionKeyMode {
        mode: FnMode,
        reply: Reply<()>,
    },
    SetConfig {
        field: ConfigField,
        value: i64,
        reply: Reply<()>,
    },
    Status {
        reply: oneshot::Sender<ControllerStatus>,
    },
}

/* Snapshot of the controller's bookkeeping. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub enabled: bool,
    /* `None` until the first evaluation after enabling. */
    pub mode: Option<Mode>,
    pub config: Config,
    pub last_activity: Option<Instant>,
    /* When the pending re-evaluation is due, if any. */
    pub deadline: Option<Instant>,
}

/* Handle used to reach the controller task. */
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerMessage>,
}

impl ControllerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ControllerMessage,
    ) -> Result<T, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| ControllerError::Stopped)?;

        reply_rx.await.map_err(|_| ControllerError::Stopped)?
    }

    /* Start tracking activity and evaluate immediately. Returns the mode the
     * strip was put in. Calling it while enabled only re-evaluates. */
    pub async fn enable(&self) -> Result<Mode, ControllerError> {
        self.request(|reply| ControllerMessage::Enable { reply })
            .await
    }

    /* Stop tracking activity. When this returns, no re-evaluation is
     * pending and none is running. */
    pub async fn disable(&self) -> Result<(), ControllerError> {
        self.request(|reply| ControllerMessage::Disable { reply })
            .await
    }

    /* Report activity without waiting for it to be processed. Activity is
     * silently dropped while the controller is disabled or gone. */
    pub async fn notify_activity(&self, at: Instant) {
        let _ = self
            .tx
            .send(ControllerMessage::Activity { at, reply: None })
            .await;
    }

    /* Report activity and wait until it has been applied. Fails with
     * `NotEnabled` while disabled. */
    pub async fn report_activity(&self, at: Instant) -> Result<(), ControllerError> {
        self.request(|reply| ControllerMessage::Activity {
            at,
            reply: Some(reply),
        })
        .await
    }

    pub async fn set_function_key_mode(&self, mode: FnMode) -> Result<(), ControllerError> {
        self.request(|reply| ControllerMessage::SetFunctionKeyMode { mode, reply })
            .await
    }

    pub async fn set_config(&self, field: ConfigField, value: i64) -> Result<(), ControllerError> {
        self.request(|reply| ControllerMessage::SetConfig {
            field,
            value,
            reply,
        })
        .await
    }

    pub async fn status(&self) -> Result<ControllerStatus, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(ControllerMessage::Status { reply: reply_tx })
            .await
            .map_err(|_| ControllerError::Stopped)?;

        reply_rx.await.map_err(|_| ControllerError::Stopped)
    }

    pub async fn config(&self) -> Result<Config, ControllerError> {
        Ok(self.status().await?.config)
    }

    /* Resolves once the controller task has exited, which happens after the
     * last handle is dropped. */
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

struct ModeController {
    config: ConfigStore,
    tracker: ActivityTracker,
    scheduler: Scheduler,
    enabled: bool,
    /* The mode the strip should be in. */
    mode: Option<Mode>,
    /* What was last handed to the transport; `None` forces a re-send. */
    applied_mode: Option<Mode>,
    applied_fn_mode: Option<FnMode>,
    transport: TransportHandle,
    rx: mpsc::Receiver<ControllerMessage>,
    reports: mpsc::UnboundedReceiver<TransportReport>,
}

impl ModeController {
    /* Main actor loop: transport reports first, then inbound messages, then
     * the timer, so activity already queued beats a timer due at the same
     * moment. After `MESSAGE_BURST` messages in a row an overdue timer runs
     * before the next message. */
    async fn run(mut self) {
        info!("Mode controller started");
        let mut burst = 0;

        loop {
            if burst >= MESSAGE_BURST {
                burst = 0;
                if self.timer_due(Instant::now()) {
                    debug!("Timer overdue after {MESSAGE_BURST} messages, running it first");
                    self.scheduler.take();
                    self.on_timer_fired(Instant::now());
                    continue;
                }
            }

            let expiry = self.scheduler.expiry();

            tokio::select! {
                biased;

                Some(report) = self.reports.recv() => self.on_transport_report(report),
                msg = self.rx.recv() => match msg {
                    Some(msg) => {
                        burst += 1;
                        self.handle(msg);
                    }
                    None => break,
                },
                _ = expiry => {
                    burst = 0;
                    self.scheduler.take();
                    self.on_timer_fired(Instant::now());
                }
            }
        }

        self.scheduler.cancel();
        self.transport.shutdown().await;
        info!("Mode controller shutting down");
    }

    fn timer_due(&self, now: Instant) -> bool {
        self.scheduler.deadline().is_some_and(|deadline| deadline <= now)
    }

    fn handle(&mut self, msg: ControllerMessage) {
        match msg {
            ControllerMessage::Enable { reply } => {
                let _ = reply.send(Ok(self.enable(Instant::now())));
            }
            ControllerMessage::Disable { reply } => {
                let _ = reply.send(self.disable());
            }
            ControllerMessage::Activity { at, reply } => {
                let result = self.notify_activity(at);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            debug!("Ignoring activity: {e}");
                        }
                    }
                }
            }
            ControllerMessage::SetFunctionKeyMode { mode, reply } => {
                if self.config.set_fn_mode(mode) {
                    info!("Function-key mode set to {mode}");
                }
                self.push_fn_mode();
                let _ = reply.send(Ok(()));
            }
            ControllerMessage::SetConfig {
                field,
                value,
                reply,
            } => {
                let _ = reply.send(self.set_config(field, value));
            }
            ControllerMessage::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn enable(&mut self, now: Instant) -> Mode {
        if self.enabled {
            debug!("Already enabled, re-evaluating");
        } else {
            info!("Enabling touch bar mode control");
            self.enabled = true;
        }

        self.push_fn_mode();
        self.reevaluate(now)
    }

    fn disable(&mut self) -> Result<(), ControllerError> {
        if !self.enabled {
            return Err(ControllerError::AlreadyDisabled);
        }

        info!("Disabling touch bar mode control");
        if self.scheduler.is_armed() {
            debug!("Cancelling pending re-evaluation");
        }
        self.scheduler.cancel();
        self.enabled = false;
        self.tracker.reset();
        self.mode = None;
        self.applied_mode = None;
        self.applied_fn_mode = None;
        Ok(())
    }

    /* Activity always returns the strip to `Active` and restarts the dim
     * countdown from the latest recorded activity. */
    fn notify_activity(&mut self, at: Instant) -> Result<(), ControllerError> {
        if !self.enabled {
            return Err(ControllerError::NotEnabled);
        }

        let latest = self.tracker.record(at);
        self.set_mode(Mode::Active);
        self.scheduler
            .arm(latest.checked_add(self.config.get().dim_timeout));
        Ok(())
    }

    fn on_timer_fired(&mut self, now: Instant) {
        if !self.enabled {
            debug!("Timer fired while disabled, ignoring");
            return;
        }
        self.reevaluate(now);
    }

    fn set_config(&mut self, field: ConfigField, value: i64) -> Result<(), ControllerError> {
        let changed = self.config.set(field, value)?;
        if changed {
            info!("Set {field} to {value}");
        }
        if field == ConfigField::FnMode {
            self.push_fn_mode();
        }
        Ok(())
    }

    /* Evaluate the state machine against the current clock, apply the
     * resulting mode and arm the next re-evaluation. */
    fn reevaluate(&mut self, now: Instant) -> Mode {
        let config = self.config.get();
        let since = self.tracker.time_since(now);
        let Evaluation {
            mode,
            next_deadline,
        } = mode::evaluate(since, &config);

        if !self.tracker.is_live() {
            debug!("No activity seen yet, treating as idle");
        }

        self.set_mode(mode);
        self.scheduler
            .arm(next_deadline.and_then(|delay| now.checked_add(delay)));
        mode
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != Some(mode) {
            info!(
                "Touch bar mode {} -> {mode}",
                self.mode.map_or("unknown", Mode::as_str)
            );
            self.mode = Some(mode);
        }

        if self.applied_mode != Some(mode) {
            self.applied_mode = self
                .emit(TransportCommand::SetDisplayMode(mode))
                .then_some(mode);
        }
    }

    /* Push the configured function-key mode if it was not applied yet. Held
     * back while disabled and sent on the next enable. */
    fn push_fn_mode(&mut self) {
        if !self.enabled {
            return;
        }

        let fn_mode = self.config.get().fn_mode;
        if self.applied_fn_mode != Some(fn_mode) {
            self.applied_fn_mode = self
                .emit(TransportCommand::SetFunctionKeyMapping(fn_mode))
                .then_some(fn_mode);
        }
    }

    fn emit(&self, command: TransportCommand) -> bool {
        match self.transport.submit(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    fn on_transport_report(&mut self, report: TransportReport) {
        let Err(reason) = report.result else {
            return;
        };

        let err = ControllerError::TransportFailure {
            command: report.command,
            reason,
        };
        warn!("{err}, will retry on next change");

        match report.command {
            TransportCommand::SetDisplayMode(mode) if self.applied_mode == Some(mode) => {
                self.applied_mode = None;
            }
            TransportCommand::SetFunctionKeyMapping(mode)
                if self.applied_fn_mode == Some(mode) =>
            {
                self.applied_fn_mode = None;
            }
            _ => {}
        }
    }

    fn status(&self) -> ControllerStatus {
        ControllerStatus {
            enabled: self.enabled,
            mode: self.mode,
            config: self.config.get(),
            last_activity: self.tracker.last_activity(),
            deadline: self.scheduler.deadline(),
        }
    }
}

/* Spawn the controller and its transport actor. The controller starts
 * disabled; call `enable()` once the hardware session is up. */
pub fn spawn_mode_controller(config: Config, transport: Box<dyn Transport>) -> ControllerHandle {
    let (report_tx, reports) = mpsc::unbounded_channel();
    let transport = actor::spawn_transport_actor(transport, report_tx);
    let (tx, rx) = mpsc::channel(MESSAGE_QUEUE_DEPTH);

    let controller = ModeController {
        config: ConfigStore::new(config),
        tracker: ActivityTracker::new(),
        scheduler: Scheduler::new(),
        enabled: false,
        mode: None,
        applied_mode: None,
        applied_fn_mode: None,
        transport,
        rx,
        reports,
    };

    tokio::spawn(async move {
        controller.run().await;
    });

    ControllerHandle { tx }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time;

    use super::*;
    use crate::transport::testing::RecordingTransport;

    struct Harness {
        handle: ControllerHandle,
        commands: UnboundedReceiver<TransportCommand>,
        failures: Arc<AtomicUsize>,
        start: Instant,
    }

    impl Harness {
        fn new(idle: u64, dim: u64) -> Self {
            let (transport, commands, failures) = RecordingTransport::new();
            let config = Config {
                idle_timeout: Duration::from_secs(idle),
                dim_timeout: Duration::from_secs(dim),
                ..Config::default()
            };
            Self {
                handle: spawn_mode_controller(config, Box::new(transport)),
                commands,
                failures,
                start: Instant::now(),
            }
        }

        fn at(&self, secs: u64) -> Instant {
            self.start + Duration::from_secs(secs)
        }

        /* Move the paused clock to `secs` after the start. */
        async fn advance_to(&self, secs: u64) {
            time::advance(self.at(secs) - Instant::now()).await;
        }

        fn elapsed_ms(&self) -> u128 {
            (Instant::now() - self.start).as_millis()
        }

        async fn next_command(&mut self) -> TransportCommand {
            self.commands.recv().await.expect("transport closed")
        }

        async fn next_display_mode(&mut self) -> Mode {
            match self.next_command().await {
                TransportCommand::SetDisplayMode(mode) => mode,
                other => panic!("Expected a display mode command, got {other}"),
            }
        }

        /* Asserts that no command shows up within an hour of virtual time. */
        async fn assert_quiet(&mut self) {
            let next = time::timeout(Duration::from_secs(3600), self.commands.recv()).await;
            assert!(next.is_err(), "Unexpected command {next:?}");
        }

        async fn status(&self) -> ControllerStatus {
            self.handle.status().await.unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_enable_dim_idle() {
        let mut h = Harness::new(60, 5);

        assert_eq!(h.handle.enable().await.unwrap(), Mode::Idle);
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::Normal)
        );
        assert_eq!(h.next_display_mode().await, Mode::Idle);
        assert_eq!(h.status().await.deadline, None);

        h.advance_to(10).await;
        h.handle.notify_activity(h.at(10)).await;
        assert_eq!(h.next_display_mode().await, Mode::Active);
        assert_eq!(h.status().await.deadline, Some(h.at(15)));

        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        assert_eq!(h.elapsed_ms(), 15_000);
        assert_eq!(h.status().await.deadline, Some(h.at(70)));

        assert_eq!(h.next_display_mode().await, Mode::Idle);
        assert_eq!(h.elapsed_ms(), 70_000);
        let status = h.status().await;
        assert_eq!(status.mode, Some(Mode::Idle));
        assert_eq!(status.deadline, None);

        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_zero_dim_timeout() {
        let mut h = Harness::new(60, 0);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        assert_eq!(h.next_display_mode().await, Mode::Idle);

        h.handle.notify_activity(h.at(0)).await;
        let status = h.status().await;
        assert_eq!(status.mode, Some(Mode::Active));
        assert_eq!(status.deadline, Some(h.at(0)));
        assert_eq!(h.next_display_mode().await, Mode::Active);

        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        assert_eq!(h.elapsed_ms(), 0);

        assert_eq!(h.next_display_mode().await, Mode::Idle);
        assert_eq!(h.elapsed_ms(), 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_latest_activity_wins() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;

        for t in [1, 2, 3] {
            h.advance_to(t).await;
            h.handle.notify_activity(h.at(t)).await;
        }

        assert_eq!(h.status().await.deadline, Some(h.at(8)));
        assert_eq!(h.next_display_mode().await, Mode::Active);
        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        assert_eq!(h.elapsed_ms(), 8_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_rejected() {
        let h = Harness::new(60, 5);

        let err = h
            .handle
            .set_config(ConfigField::IdleTimeout, -1)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControllerError::InvalidArgument {
                field: ConfigField::IdleTimeout,
                value: -1
            }
        );
        assert_eq!(
            h.handle.config().await.unwrap().idle_timeout,
            Duration::from_secs(60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_wins_in_every_mode() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        assert_eq!(h.next_display_mode().await, Mode::Idle);

        /* From idle */
        h.handle.report_activity(h.at(0)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);
        assert_eq!(h.status().await.deadline, Some(h.at(5)));

        /* From dimmed */
        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        h.handle.report_activity(h.at(5)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);
        assert_eq!(h.status().await.deadline, Some(h.at(10)));

        /* From active: no command, only a fresh deadline */
        h.advance_to(7).await;
        h.handle.report_activity(h.at(7)).await.unwrap();
        let status = h.status().await;
        assert_eq!(status.mode, Some(Mode::Active));
        assert_eq!(status.deadline, Some(h.at(12)));
        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        assert_eq!(h.elapsed_ms(), 12_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_activity_does_not_rewind() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;

        h.advance_to(4).await;
        h.handle.report_activity(h.at(4)).await.unwrap();
        h.handle.report_activity(h.at(1)).await.unwrap();

        let status = h.status().await;
        assert_eq!(status.last_activity, Some(h.at(4)));
        assert_eq!(status.deadline, Some(h.at(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_cancels_pending_timer() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;

        for t in [1, 2, 3] {
            h.handle.notify_activity(h.at(t)).await;
        }
        assert_eq!(h.next_display_mode().await, Mode::Active);
        h.handle.disable().await.unwrap();

        let status = h.status().await;
        assert!(!status.enabled);
        assert_eq!(status.deadline, None);
        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_no_ops() {
        let mut h = Harness::new(60, 5);

        assert_eq!(
            h.handle.disable().await.unwrap_err(),
            ControllerError::AlreadyDisabled
        );
        assert_eq!(
            h.handle.report_activity(h.at(0)).await.unwrap_err(),
            ControllerError::NotEnabled
        );
        h.handle.notify_activity(h.at(0)).await;
        assert_eq!(h.status().await.mode, None);
        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_twice_only_reevaluates() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;

        assert_eq!(h.handle.enable().await.unwrap(), Mode::Idle);
        assert!(h.status().await.enabled);
        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reenable_starts_idle_and_resends() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;
        h.handle.report_activity(h.at(0)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);

        h.handle.disable().await.unwrap();
        assert_eq!(h.handle.enable().await.unwrap(), Mode::Idle);
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::Normal)
        );
        assert_eq!(h.next_display_mode().await, Mode::Idle);
        assert_eq!(h.status().await.last_activity, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_is_fixed_point() {
        let mut h = Harness::new(10, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;
        h.handle.report_activity(h.at(0)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);
        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        assert_eq!(h.next_display_mode().await, Mode::Idle);

        for _ in 0..3 {
            assert_eq!(h.handle.enable().await.unwrap(), Mode::Idle);
            assert_eq!(h.status().await.deadline, None);
        }
        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_read_at_next_evaluation() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;
        h.handle.report_activity(h.at(0)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);

        /* The armed deadline is left alone; the new timeout applies when it
         * fires. */
        h.handle.set_config(ConfigField::DimTimeout, 8).await.unwrap();
        assert_eq!(h.status().await.deadline, Some(h.at(5)));

        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        assert_eq!(h.elapsed_ms(), 8_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_function_key_mode() {
        let mut h = Harness::new(60, 5);

        /* Stored while disabled, pushed on enable */
        h.handle
            .set_function_key_mode(FnMode::FKeys)
            .await
            .unwrap();
        assert_eq!(h.handle.config().await.unwrap().fn_mode, FnMode::FKeys);
        h.handle.enable().await.unwrap();
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::FKeys)
        );
        h.next_display_mode().await;

        /* Unchanged mode emits nothing */
        h.handle
            .set_function_key_mode(FnMode::FKeys)
            .await
            .unwrap();

        h.handle.set_config(ConfigField::FnMode, 0).await.unwrap();
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::Normal)
        );
        assert!(h.handle.set_config(ConfigField::FnMode, 5).await.is_err());
        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_retried_on_next_change() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;

        h.failures.store(1, Ordering::SeqCst);
        h.handle.report_activity(h.at(0)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);
        assert_eq!(h.status().await.mode, Some(Mode::Active));

        h.advance_to(1).await;
        h.handle.report_activity(h.at(1)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);

        h.advance_to(2).await;
        h.handle.report_activity(h.at(2)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Dimmed);
        assert_eq!(h.elapsed_ms(), 7_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_polling_cannot_starve_timer() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;
        h.handle.report_activity(h.at(0)).await.unwrap();
        assert_eq!(h.next_display_mode().await, Mode::Active);

        let pollers: Vec<_> = (0..MESSAGE_QUEUE_DEPTH)
            .map(|_| {
                let handle = h.handle.clone();
                tokio::spawn(async move { while handle.status().await.is_ok() {} })
            })
            .collect();

        h.advance_to(5).await;
        assert_eq!(h.next_display_mode().await, Mode::Dimmed);

        for poller in pollers {
            poller.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_function_key_failure_resent_on_next_push() {
        let mut h = Harness::new(60, 5);
        h.handle.enable().await.unwrap();
        h.next_command().await;
        h.next_display_mode().await;

        h.failures.store(1, Ordering::SeqCst);
        h.handle
            .set_function_key_mode(FnMode::FKeys)
            .await
            .unwrap();
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::FKeys)
        );

        /* Same mode again: only re-sent because the first attempt failed */
        h.handle
            .set_function_key_mode(FnMode::FKeys)
            .await
            .unwrap();
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::FKeys)
        );

        h.handle
            .set_function_key_mode(FnMode::FKeys)
            .await
            .unwrap();
        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_function_key_failure_resent_on_enable() {
        let mut h = Harness::new(60, 5);
        h.failures.store(1, Ordering::SeqCst);
        h.handle.enable().await.unwrap();
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::Normal)
        );
        assert_eq!(h.next_display_mode().await, Mode::Idle);

        assert_eq!(h.handle.enable().await.unwrap(), Mode::Idle);
        assert_eq!(
            h.next_command().await,
            TransportCommand::SetFunctionKeyMapping(FnMode::Normal)
        );
        h.assert_quiet().await;
    }
}

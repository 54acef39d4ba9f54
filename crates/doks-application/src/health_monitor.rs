//! Adaptive health monitoring of the remote RAG API.
//!
//! `HealthMonitor` polls the health endpoint on a schedule that adapts to
//! recent history:
//!
//! - healthy: every `healthy_interval`
//! - just turned unhealthy: a short `recovering_interval` probe
//! - check failed: `failed_base_interval * multiplier^(failures - 1)`, capped
//!   at `max_backoff_interval`
//!
//! Polling pauses while the host UI is hidden and resumes with an immediate
//! check when it becomes visible again.

use chrono::Utc;
use doks_core::config::HealthConfig;
use doks_core::health::{HealthApi, HealthSink, HealthState, HealthStatus, Visibility};
use doks_core::schedule::{ScheduleHandle, Scheduler, TickFn};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Scheduling bookkeeping. Never held across an `.await`.
struct Control {
    running: bool,
    visible: bool,
    first_check_done: bool,
    timer: Option<ScheduleHandle>,
    watcher: Option<CancellationToken>,
}

impl Control {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Polls the Health API and publishes a [`HealthState`].
///
/// Create with [`HealthMonitor::new`]; the monitor is always shared through
/// an `Arc` because scheduled ticks call back into it.
pub struct HealthMonitor {
    this: Weak<HealthMonitor>,
    api: Arc<dyn HealthApi>,
    scheduler: Arc<dyn Scheduler>,
    config: HealthConfig,
    state: watch::Sender<HealthState>,
    control: Mutex<Control>,
    visibility: Option<watch::Receiver<Visibility>>,
}

impl HealthMonitor {
    /// Creates a stopped monitor.
    ///
    /// # Arguments
    ///
    /// * `api` - The health endpoint
    /// * `scheduler` - Source of repeating timers
    /// * `config` - Polling intervals and backoff parameters
    pub fn new(
        api: Arc<dyn HealthApi>,
        scheduler: Arc<dyn Scheduler>,
        config: HealthConfig,
    ) -> Arc<Self> {
        Self::build(api, scheduler, config, None)
    }

    /// Creates a stopped monitor that pauses while `visibility` reports `Hidden`.
    pub fn with_visibility(
        api: Arc<dyn HealthApi>,
        scheduler: Arc<dyn Scheduler>,
        config: HealthConfig,
        visibility: watch::Receiver<Visibility>,
    ) -> Arc<Self> {
        Self::build(api, scheduler, config, Some(visibility))
    }

    fn build(
        api: Arc<dyn HealthApi>,
        scheduler: Arc<dyn Scheduler>,
        config: HealthConfig,
        visibility: Option<watch::Receiver<Visibility>>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(HealthState::initial(config.healthy_interval()));
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            api,
            scheduler,
            config,
            state,
            control: Mutex::new(Control {
                running: false,
                visible: true,
                first_check_done: false,
                timer: None,
                watcher: None,
            }),
            visibility,
        })
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        // Control holds no invariants a panicking holder could break
        self.control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state snapshot.
    pub fn state(&self) -> HealthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.state.subscribe()
    }

    /// Conceptual state derived from the current [`HealthState`].
    pub fn status(&self) -> HealthStatus {
        self.status_of(&self.state.borrow())
    }

    fn status_of(&self, state: &HealthState) -> HealthStatus {
        match state.is_healthy {
            None => HealthStatus::Unknown,
            Some(true) => HealthStatus::Healthy,
            Some(false)
                if state.consecutive_failures == 0
                    || state.current_interval <= self.config.recovering_interval() =>
            {
                HealthStatus::Recovering {
                    failures: state.consecutive_failures,
                }
            }
            Some(false) => HealthStatus::Failed {
                failures: state.consecutive_failures,
            },
        }
    }

    /// One-line description for status bars.
    pub fn summary(&self) -> String {
        let state = self.state();
        match self.status_of(&state) {
            HealthStatus::Unknown if state.is_checking => "Checking API status...".to_string(),
            HealthStatus::Unknown => "API status unknown".to_string(),
            HealthStatus::Healthy => match state.last_checked_at {
                Some(at) => format!("API healthy (checked {})", at.format("%H:%M:%S")),
                None => "API healthy".to_string(),
            },
            HealthStatus::Recovering { .. } => format!(
                "API unavailable, retrying in {}",
                format_interval(state.current_interval)
            ),
            HealthStatus::Failed { failures } => format!(
                "API unavailable after {} failed checks, retrying in {}",
                failures,
                format_interval(state.current_interval)
            ),
        }
    }

    /// Starts polling.
    ///
    /// Clears any existing schedule, resets the failure count, performs one
    /// immediate check and then schedules repeating checks. When a
    /// visibility source is attached, a watcher pauses and resumes polling.
    pub async fn start(&self) {
        let visible = self
            .visibility
            .as_ref()
            .map(|rx| *rx.borrow() == Visibility::Visible)
            .unwrap_or(true);

        {
            let mut control = self.control();
            control.cancel_timer();
            if let Some(watcher) = control.watcher.take() {
                watcher.cancel();
            }
            control.running = true;
            control.visible = visible;
        }

        let healthy_interval = self.config.healthy_interval();
        self.state.send_modify(|state| {
            state.consecutive_failures = 0;
            state.current_interval = healthy_interval;
        });

        tracing::info!(
            "[HealthMonitor] Started ({}s healthy interval)",
            healthy_interval.as_secs()
        );

        if visible {
            self.check_health(false).await;
        }
        self.reschedule();
        self.spawn_visibility_watcher();
    }

    /// Stops polling and the visibility watcher. Safe to call when not started.
    pub fn stop(&self) {
        let mut control = self.control();
        let was_running = control.running;
        control.running = false;
        control.cancel_timer();
        if let Some(watcher) = control.watcher.take() {
            watcher.cancel();
        }
        if was_running {
            tracing::info!("[HealthMonitor] Stopped");
        }
    }

    /// Performs one health check and updates the state.
    ///
    /// `is_checking` is raised only for the first-ever check or when `force`
    /// is set, so periodic checks do not flicker a "checking" indicator.
    /// Errors are converted into an unhealthy observation; this method never
    /// fails.
    pub async fn check_health(&self, force: bool) {
        let first = !self.control().first_check_done;
        if first || force {
            self.state.send_modify(|state| state.is_checking = true);
        }

        let result = self.api.check().await;
        let now = Utc::now();
        let config = &self.config;
        // Compared against the state this check replaces, not the one it started from
        let mut interval_changed = false;

        match result {
            Ok(report) => {
                let healthy = report.is_healthy();
                let mut transitioned = false;
                self.state.send_modify(|state| {
                    let before = state.current_interval;
                    if first || state.is_healthy != Some(healthy) {
                        transitioned = true;
                        state.is_healthy = Some(healthy);
                        state.last_checked_at = Some(now);
                        state.check_count += 1;
                        if healthy {
                            state.consecutive_failures = 0;
                            state.current_interval = config.healthy_interval();
                        } else {
                            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                            state.current_interval = config.recovering_interval();
                        }
                    } else {
                        state.last_checked_at = Some(now);
                    }
                    state.is_checking = false;
                    interval_changed = state.current_interval != before;
                });

                if transitioned {
                    if healthy {
                        tracing::info!("[HealthMonitor] API is healthy");
                    } else {
                        tracing::warn!(
                            "[HealthMonitor] API reported status '{}' (services: {:?})",
                            report.status,
                            report.services
                        );
                    }
                }
            }
            Err(err) => {
                self.state.send_modify(|state| {
                    let before = state.current_interval;
                    if first || state.is_healthy != Some(false) {
                        state.check_count += 1;
                    }
                    state.is_healthy = Some(false);
                    state.last_checked_at = Some(now);
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    state.current_interval = config.backoff_interval(state.consecutive_failures);
                    state.is_checking = false;
                    interval_changed = state.current_interval != before;
                });

                let state = self.state();
                if err.is_unreachable() {
                    tracing::warn!(
                        "[HealthMonitor] API unreachable, client may be offline (failure {}, next check in {}s): {}",
                        state.consecutive_failures,
                        state.current_interval.as_secs(),
                        err
                    );
                } else {
                    tracing::warn!(
                        "[HealthMonitor] Health check failed (failure {}, next check in {}s): {}",
                        state.consecutive_failures,
                        state.current_interval.as_secs(),
                        err
                    );
                }
            }
        }

        self.control().first_check_done = true;

        if interval_changed {
            self.reschedule();
        }
    }

    /// Host visibility changed.
    ///
    /// Hidden cancels the timer. Visible fires an immediate check and resumes
    /// the schedule. Does nothing beyond recording the visibility while the
    /// monitor is stopped.
    pub async fn on_visibility_changed(&self, visibility: Visibility) {
        match visibility {
            Visibility::Hidden => {
                let mut control = self.control();
                if !control.visible {
                    return;
                }
                control.visible = false;
                if control.running {
                    control.cancel_timer();
                    tracing::debug!("[HealthMonitor] Hidden, polling paused");
                }
            }
            Visibility::Visible => {
                {
                    let mut control = self.control();
                    let resume = control.running && !control.visible;
                    control.visible = true;
                    if !resume {
                        return;
                    }
                }
                tracing::debug!("[HealthMonitor] Visible again, resuming polling");
                self.check_health(false).await;
                self.reschedule();
            }
        }
    }

    /// Replaces the repeating schedule with one at the current interval.
    ///
    /// In-flight checks are not affected.
    fn reschedule(&self) {
        let mut control = self.control();
        control.cancel_timer();
        if !(control.running && control.visible) {
            return;
        }

        let interval = self.state.borrow().current_interval;
        let this = self.this.clone();
        let tick: TickFn = Arc::new(move || {
            let this = this.clone();
            Box::pin(async move {
                if let Some(monitor) = this.upgrade() {
                    monitor.check_health(false).await;
                }
            }) as BoxFuture<'static, ()>
        });

        control.timer = Some(self.scheduler.schedule_repeating(interval, tick));
        tracing::debug!("[HealthMonitor] Next checks every {}s", interval.as_secs());
    }

    fn spawn_visibility_watcher(&self) {
        let Some(mut visibility) = self.visibility.clone() else {
            return;
        };
        let token = CancellationToken::new();
        self.control().watcher = Some(token.clone());
        // Only transitions after start() matter
        let _ = visibility.borrow_and_update();

        let this = self.this.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = visibility.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let current = *visibility.borrow_and_update();
                let Some(monitor) = this.upgrade() else {
                    break;
                };
                monitor.on_visibility_changed(current).await;
            }
        });
    }
}

impl HealthSink for HealthMonitor {
    /// Flips the state to unhealthy right away without touching the schedule.
    fn mark_external_failure(&self) {
        let changed = self.state.send_if_modified(|state| {
            if state.is_healthy == Some(false) {
                return false;
            }
            state.is_healthy = Some(false);
            state.last_checked_at = Some(Utc::now());
            true
        });
        if changed {
            tracing::warn!("[HealthMonitor] Marked unhealthy after a failed API call");
        }
    }
}

fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doks_core::error::{DoksError, Result};
    use doks_core::health::HealthReport;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    // Scheduler that records schedules and fires them on demand
    #[derive(Default)]
    struct ManualScheduler {
        schedules: Mutex<Vec<(Duration, TickFn, CancellationToken)>>,
    }

    impl Scheduler for ManualScheduler {
        fn schedule_repeating(&self, every: Duration, tick: TickFn) -> ScheduleHandle {
            let token = CancellationToken::new();
            self.schedules
                .lock()
                .unwrap()
                .push((every, tick, token.clone()));
            ScheduleHandle::new(token)
        }
    }

    impl ManualScheduler {
        fn active(&self) -> Vec<Duration> {
            self.schedules
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, _, token)| !token.is_cancelled())
                .map(|(every, _, _)| *every)
                .collect()
        }

        fn total(&self) -> usize {
            self.schedules.lock().unwrap().len()
        }

        async fn fire(&self) {
            let tick = self
                .schedules
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(_, _, token)| !token.is_cancelled())
                .map(|(_, tick, _)| tick.clone())
                .expect("no active schedule");
            tick().await;
        }
    }

    // Health API returning scripted results; healthy once the script runs out.
    // Held entries wait for `release` before answering.
    #[derive(Default)]
    struct ScriptedHealthApi {
        script: Mutex<VecDeque<(bool, Result<HealthReport>)>>,
        calls: AtomicUsize,
        gate: Notify,
    }

    impl ScriptedHealthApi {
        fn push_status(&self, status: &str) {
            self.script.lock().unwrap().push_back((false, Ok(report(status))));
        }

        fn push_error(&self, err: DoksError) {
            self.script.lock().unwrap().push_back((false, Err(err)));
        }

        fn push_held(&self, result: Result<HealthReport>) {
            self.script.lock().unwrap().push_back((true, result));
        }

        fn release(&self) {
            self.gate.notify_one();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthApi for ScriptedHealthApi {
        async fn check(&self) -> Result<HealthReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (held, result) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| (false, Ok(report("healthy"))));
            if held {
                self.gate.notified().await;
            }
            result
        }
    }

    // Health API that blocks until released
    struct GatedHealthApi {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HealthApi for GatedHealthApi {
        async fn check(&self) -> Result<HealthReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(report("healthy"))
        }
    }

    fn report(status: &str) -> HealthReport {
        HealthReport {
            status: status.to_string(),
            services: HashMap::new(),
            timestamp: None,
        }
    }

    fn offline() -> DoksError {
        DoksError::Unreachable("connection refused".into())
    }

    fn setup() -> (Arc<HealthMonitor>, Arc<ScriptedHealthApi>, Arc<ManualScheduler>) {
        let api = Arc::new(ScriptedHealthApi::default());
        let scheduler = Arc::new(ManualScheduler::default());
        let monitor = HealthMonitor::new(api.clone(), scheduler.clone(), HealthConfig::default());
        (monitor, api, scheduler)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_first_successful_check() {
        let (monitor, _api, _scheduler) = setup();
        assert_eq!(monitor.status(), HealthStatus::Unknown);

        monitor.check_health(false).await;

        let state = monitor.state();
        assert_eq!(state.is_healthy, Some(true));
        assert!(!state.is_checking);
        assert!(state.last_checked_at.is_some());
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.current_interval, Duration::from_secs(30));
        assert_eq!(state.check_count, 1);
        assert_eq!(monitor.status(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_failed_check_marks_unhealthy() {
        let (monitor, api, _scheduler) = setup();
        api.push_error(offline());

        monitor.check_health(false).await;

        let state = monitor.state();
        assert_eq!(state.is_healthy, Some(false));
        assert!(!state.is_checking);
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.current_interval, Duration::from_secs(60));
        assert_eq!(monitor.status(), HealthStatus::Failed { failures: 1 });
    }

    #[tokio::test]
    async fn test_backoff_after_three_failures() {
        let (monitor, api, _scheduler) = setup();
        for _ in 0..3 {
            api.push_error(DoksError::Transport("timed out".into()));
        }

        for _ in 0..3 {
            monitor.check_health(false).await;
        }

        let state = monitor.state();
        assert_eq!(state.consecutive_failures, 3);
        assert_eq!(state.current_interval, Duration::from_millis(135_000));
    }

    #[tokio::test]
    async fn test_backoff_is_capped() {
        let (monitor, api, _scheduler) = setup();
        for _ in 0..8 {
            api.push_error(offline());
        }
        for _ in 0..8 {
            monitor.check_health(false).await;
        }
        assert_eq!(monitor.state().current_interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_success_after_failure_resets() {
        let (monitor, api, _scheduler) = setup();
        api.push_error(offline());
        api.push_status("healthy");

        monitor.check_health(false).await;
        monitor.check_health(false).await;

        let state = monitor.state();
        assert_eq!(state.is_healthy, Some(true));
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.current_interval, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_reported_unhealthy_probes_at_recovering_interval() {
        let (monitor, api, _scheduler) = setup();
        api.push_status("healthy");
        api.push_status("degraded");

        monitor.check_health(false).await;
        monitor.check_health(false).await;

        let state = monitor.state();
        assert_eq!(state.is_healthy, Some(false));
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.current_interval, Duration::from_secs(15));
        assert_eq!(monitor.status(), HealthStatus::Recovering { failures: 1 });
        assert_eq!(state.check_count, 2);
    }

    #[tokio::test]
    async fn test_unchanged_status_only_refreshes_timestamp() {
        let (monitor, _api, _scheduler) = setup();
        monitor.check_health(false).await;
        let before = monitor.state();

        monitor.check_health(false).await;

        let after = monitor.state();
        assert_eq!(after.check_count, before.check_count);
        assert!(after.last_checked_at >= before.last_checked_at);
        assert_eq!(after.current_interval, before.current_interval);
    }

    #[tokio::test]
    async fn test_start_checks_then_schedules() {
        let (monitor, api, scheduler) = setup();

        monitor.start().await;

        assert_eq!(api.calls(), 1);
        assert_eq!(monitor.state().is_healthy, Some(true));
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn test_start_twice_keeps_single_schedule() {
        let (monitor, _api, scheduler) = setup();

        monitor.start().await;
        monitor.start().await;

        assert_eq!(scheduler.active().len(), 1);
    }

    #[tokio::test]
    async fn test_start_resets_failures() {
        let (monitor, api, _scheduler) = setup();
        api.push_error(offline());
        monitor.check_health(false).await;
        assert_eq!(monitor.state().consecutive_failures, 1);

        monitor.start().await;

        assert_eq!(monitor.state().consecutive_failures, 0);
        assert_eq!(monitor.state().current_interval, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_interval_change_recreates_schedule() {
        let (monitor, api, scheduler) = setup();
        monitor.start().await;
        api.push_error(offline());
        api.push_error(offline());

        scheduler.fire().await;
        assert_eq!(scheduler.active(), vec![Duration::from_secs(60)]);

        scheduler.fire().await;
        assert_eq!(scheduler.active(), vec![Duration::from_secs(90)]);

        // back to healthy
        scheduler.fire().await;
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);
        assert_eq!(monitor.state().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_overlapping_recovery_restores_healthy_schedule() {
        let (monitor, api, scheduler) = setup();
        monitor.start().await;
        api.push_held(Ok(report("healthy")));
        api.push_error(offline());

        // periodic tick stuck in the API call
        let tick = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.fire().await }
        });
        settle().await;

        monitor.check_health(true).await;
        assert_eq!(scheduler.active(), vec![Duration::from_secs(60)]);

        api.release();
        tick.await.unwrap();

        let state = monitor.state();
        assert_eq!(state.is_healthy, Some(true));
        assert_eq!(state.current_interval, Duration::from_secs(30));
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn test_overlapping_failure_restores_backoff_schedule() {
        let (monitor, api, scheduler) = setup();
        monitor.start().await;
        api.push_error(offline());
        scheduler.fire().await;
        assert_eq!(scheduler.active(), vec![Duration::from_secs(60)]);

        api.push_held(Err(offline()));
        let tick = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.fire().await }
        });
        settle().await;

        // forced check succeeds while the tick is still waiting
        monitor.check_health(true).await;
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);

        api.release();
        tick.await.unwrap();

        let state = monitor.state();
        assert_eq!(state.is_healthy, Some(false));
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.current_interval, Duration::from_secs(60));
        assert_eq!(scheduler.active(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn test_steady_state_does_not_reschedule() {
        let (monitor, _api, scheduler) = setup();
        monitor.start().await;
        let schedules = scheduler.total();

        scheduler.fire().await;
        scheduler.fire().await;

        assert_eq!(scheduler.total(), schedules);
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn test_stop_cancels_schedule() {
        let (monitor, _api, scheduler) = setup();
        monitor.start().await;

        monitor.stop();

        assert!(scheduler.active().is_empty());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_safe() {
        let (monitor, api, scheduler) = setup();
        monitor.stop();
        monitor.stop();
        assert_eq!(api.calls(), 0);
        assert_eq!(scheduler.total(), 0);
    }

    #[tokio::test]
    async fn test_failure_after_stop_does_not_schedule() {
        let (monitor, api, scheduler) = setup();
        monitor.start().await;
        monitor.stop();
        api.push_error(offline());

        monitor.check_health(true).await;

        assert!(scheduler.active().is_empty());
        assert_eq!(monitor.state().is_healthy, Some(false));
    }

    #[tokio::test]
    async fn test_external_failure_does_not_reschedule() {
        let (monitor, api, scheduler) = setup();
        monitor.start().await;
        let schedules = scheduler.total();

        monitor.mark_external_failure();

        assert_eq!(monitor.state().is_healthy, Some(false));
        assert_eq!(scheduler.total(), schedules);
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_external_failure_is_idempotent() {
        let (monitor, api, _scheduler) = setup();
        api.push_error(offline());
        monitor.check_health(false).await;
        let before = monitor.state();

        monitor.mark_external_failure();

        assert_eq!(monitor.state(), before);
    }

    #[tokio::test]
    async fn test_hidden_pauses_and_visible_resumes() {
        let (monitor, api, scheduler) = setup();
        monitor.start().await;

        monitor.on_visibility_changed(Visibility::Hidden).await;
        assert!(scheduler.active().is_empty());
        assert_eq!(api.calls(), 1);

        monitor.on_visibility_changed(Visibility::Visible).await;
        assert_eq!(api.calls(), 2);
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn test_failure_while_hidden_does_not_schedule() {
        let (monitor, api, scheduler) = setup();
        monitor.start().await;
        monitor.on_visibility_changed(Visibility::Hidden).await;
        api.push_error(offline());

        monitor.check_health(true).await;

        assert!(scheduler.active().is_empty());
    }

    #[tokio::test]
    async fn test_visibility_channel_drives_monitor() {
        let api = Arc::new(ScriptedHealthApi::default());
        let scheduler = Arc::new(ManualScheduler::default());
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);
        let monitor = HealthMonitor::with_visibility(
            api.clone(),
            scheduler.clone(),
            HealthConfig::default(),
            visibility_rx,
        );
        monitor.start().await;
        assert_eq!(api.calls(), 1);

        visibility_tx.send(Visibility::Hidden).unwrap();
        settle().await;
        assert!(scheduler.active().is_empty());

        visibility_tx.send(Visibility::Visible).unwrap();
        settle().await;
        assert_eq!(api.calls(), 2);
        assert_eq!(scheduler.active(), vec![Duration::from_secs(30)]);

        monitor.stop();
        visibility_tx.send(Visibility::Hidden).unwrap();
        visibility_tx.send(Visibility::Visible).unwrap();
        settle().await;
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_start_while_hidden_waits_for_visible() {
        let api = Arc::new(ScriptedHealthApi::default());
        let scheduler = Arc::new(ManualScheduler::default());
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Hidden);
        let monitor = HealthMonitor::with_visibility(
            api.clone(),
            scheduler.clone(),
            HealthConfig::default(),
            visibility_rx,
        );

        monitor.start().await;
        assert_eq!(api.calls(), 0);
        assert!(scheduler.active().is_empty());

        visibility_tx.send(Visibility::Visible).unwrap();
        settle().await;
        assert_eq!(api.calls(), 1);
        assert_eq!(scheduler.active().len(), 1);
    }

    #[tokio::test]
    async fn test_checking_flag_only_for_first_or_forced() {
        let api = Arc::new(GatedHealthApi {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let monitor = HealthMonitor::new(
            api.clone(),
            Arc::new(ManualScheduler::default()),
            HealthConfig::default(),
        );

        // first check
        let task = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_health(false).await }
        });
        settle().await;
        assert!(monitor.state().is_checking);
        api.gate.notify_one();
        task.await.unwrap();
        assert!(!monitor.state().is_checking);

        // periodic check
        let task = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_health(false).await }
        });
        settle().await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert!(!monitor.state().is_checking);
        api.gate.notify_one();
        task.await.unwrap();

        // forced check
        let task = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_health(true).await }
        });
        settle().await;
        assert!(monitor.state().is_checking);
        api.gate.notify_one();
        task.await.unwrap();
        assert!(!monitor.state().is_checking);
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let (monitor, api, _scheduler) = setup();
        let mut rx = monitor.subscribe();
        api.push_error(offline());

        monitor.check_health(false).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().is_healthy, Some(false));
    }

    #[tokio::test]
    async fn test_summary_text() {
        let (monitor, api, _scheduler) = setup();
        assert_eq!(monitor.summary(), "Checking API status...");

        api.push_error(offline());
        api.push_error(offline());
        monitor.check_health(false).await;
        monitor.check_health(false).await;
        assert_eq!(
            monitor.summary(),
            "API unavailable after 2 failed checks, retrying in 90s"
        );

        monitor.check_health(false).await;
        assert!(monitor.summary().starts_with("API healthy (checked "));
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(45)), "45s");
        assert_eq!(format_interval(Duration::from_secs(300)), "5m");
        assert_eq!(format_interval(Duration::from_secs(90)), "90s");
    }
}

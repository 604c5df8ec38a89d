use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use import_core::ImportJob;
use import_logging::{import_debug, import_info, import_warn};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{JobRegistry, StatusChannel};

/// Fixed delay between poll passes; also the retry cadence for failed polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
        }
    }
}

/// Foreground/background signal from the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppLifecycle {
    #[default]
    Foreground,
    Background,
}

/// Counts from one poll pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    pub polled: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct LoopControl {
    running: Option<CancellationToken>,
    last_active: usize,
    foreground: bool,
}

/// Keeps exactly one polling loop alive while the registry holds active jobs.
///
/// The loop is started and stopped only when the active count crosses zero,
/// so any number of registry changes in between never spawns a second loop.
/// Backgrounding stops the loop; returning to the foreground restarts it with
/// an immediate pass if active jobs remain.
///
/// Starting a loop spawns a tokio task, so the notification methods must be
/// called from within a runtime.
pub struct PollingCoordinator {
    registry: Arc<JobRegistry>,
    channel: Arc<dyn StatusChannel>,
    settings: PollSettings,
    control: Mutex<LoopControl>,
    loops_started: AtomicU64,
    passes: Arc<AtomicU64>,
}

impl PollingCoordinator {
    pub fn new(
        registry: Arc<JobRegistry>,
        channel: Arc<dyn StatusChannel>,
        settings: PollSettings,
    ) -> Self {
        Self {
            registry,
            channel,
            settings,
            control: Mutex::new(LoopControl {
                running: None,
                last_active: 0,
                foreground: true,
            }),
            loops_started: AtomicU64::new(0),
            passes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Feeds one registry snapshot into the edge detector.
    ///
    /// Rows waiting on a retry's resubmission count as idle: nothing is polled
    /// for them until the replacement job arrives.
    pub fn on_registry_change(&self, jobs: &[ImportJob]) {
        let active = jobs.iter().filter(|job| job.needs_polling()).count();
        let mut control = self.lock();
        let previous = std::mem::replace(&mut control.last_active, active);

        if previous == 0 && active > 0 {
            if control.foreground {
                self.start_locked(&mut control);
            } else {
                import_debug!("{} active jobs while backgrounded; polling deferred", active);
            }
        } else if previous > 0 && active == 0 {
            self.stop_locked(&mut control);
        }
    }

    pub fn on_lifecycle(&self, lifecycle: AppLifecycle) {
        let mut control = self.lock();
        match lifecycle {
            AppLifecycle::Background => {
                control.foreground = false;
                self.stop_locked(&mut control);
            }
            AppLifecycle::Foreground => {
                control.foreground = true;
                let active = self.registry.pollable_count();
                control.last_active = active;
                if active > 0 {
                    self.start_locked(&mut control);
                }
            }
        }
    }

    /// Cancels future ticks of the running loop, if any. Idempotent.
    pub fn stop(&self) {
        let mut control = self.lock();
        self.stop_locked(&mut control);
    }

    pub fn is_polling(&self) -> bool {
        self.lock().running.is_some()
    }

    /// How many loops have been started over this coordinator's lifetime.
    pub fn loops_started(&self) -> u64 {
        self.loops_started.load(Ordering::SeqCst)
    }

    /// How many poll passes have begun, across all loops.
    pub fn passes_started(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Supervises registry changes and lifecycle transitions until `shutdown`
    /// fires, then stops the loop.
    pub async fn run(
        self: Arc<Self>,
        mut lifecycle: watch::Receiver<AppLifecycle>,
        shutdown: CancellationToken,
    ) {
        let mut changes = self.registry.subscribe();
        let initial_lifecycle = *lifecycle.borrow_and_update();
        {
            let mut control = self.lock();
            control.foreground = initial_lifecycle == AppLifecycle::Foreground;
            if !control.foreground {
                self.stop_locked(&mut control);
            }
        }
        let snapshot = changes.borrow_and_update().clone();
        self.on_registry_change(&snapshot);

        let mut lifecycle_open = true;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = changes.borrow_and_update().clone();
                    self.on_registry_change(&snapshot);
                }
                changed = lifecycle.changed(), if lifecycle_open => {
                    match changed {
                        Ok(()) => {
                            let state = *lifecycle.borrow_and_update();
                            self.on_lifecycle(state);
                        }
                        Err(_) => lifecycle_open = false,
                    }
                }
            }
        }

        self.stop();
    }

    fn lock(&self) -> MutexGuard<'_, LoopControl> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_locked(&self, control: &mut LoopControl) {
        if control.running.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        control.running = Some(cancel.clone());
        let loop_number = self.loops_started.fetch_add(1, Ordering::SeqCst) + 1;
        import_info!(
            "Starting import poll loop #{} (interval {:?})",
            loop_number,
            self.settings.interval
        );

        tokio::spawn(poll_loop(
            self.registry.clone(),
            self.channel.clone(),
            self.settings.interval,
            cancel,
            self.passes.clone(),
        ));
    }

    fn stop_locked(&self, control: &mut LoopControl) {
        if let Some(cancel) = control.running.take() {
            cancel.cancel();
            import_info!("Stopped import poll loop");
        }
    }
}

async fn poll_loop(
    registry: Arc<JobRegistry>,
    channel: Arc<dyn StatusChannel>,
    interval: Duration,
    cancel: CancellationToken,
    passes: Arc<AtomicU64>,
) {
    // The first tick completes immediately.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let pass = passes.fetch_add(1, Ordering::SeqCst) + 1;
        let summary = poll_pass(&registry, channel.as_ref()).await;
        import_debug!(
            "Poll pass #{}: polled={} updated={} failed={}",
            pass,
            summary.polled,
            summary.updated,
            summary.failed
        );
    }
}

/// Queries the server once for every job that is active right now and not
/// waiting on a retry.
///
/// Requests are issued together and merged one at a time as they complete.
/// A failed query is logged and leaves that job's last known state in place.
/// An answer that arrives after its job was removed, finished or put into
/// retry is dropped.
pub async fn poll_pass(registry: &JobRegistry, channel: &dyn StatusChannel) -> PassSummary {
    let active = registry.list_pollable();
    let mut summary = PassSummary {
        polled: active.len(),
        ..PassSummary::default()
    };

    let mut in_flight: FuturesUnordered<_> = active
        .into_iter()
        .map(|job| async move {
            let result = channel.fetch_status(&job.job_id).await;
            (job.job_id, result)
        })
        .collect();

    while let Some((job_id, result)) = in_flight.next().await {
        match result {
            Ok(report) => {
                if report.job_id != job_id {
                    import_warn!(
                        "Status for {} came back labelled {}; applying to {}",
                        job_id,
                        report.job_id,
                        job_id
                    );
                }
                if registry.update(&job_id, report.into_patch()) {
                    summary.updated += 1;
                } else {
                    import_debug!("Dropped stale status for job {}", job_id);
                }
            }
            Err(err) => {
                import_warn!("Status poll for job {} failed: {}", job_id, err);
                summary.failed += 1;
            }
        }
    }

    summary
}

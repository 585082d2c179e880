//! The page-side detection loop.
//!
//! One loop runs per active session. It re-reads the page on a fixed set of
//! triggers, passes each title through an [`EmissionGate`] and hands emitted
//! titles to a [`ViewingRelay`] without waiting for the reply.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use reelmark_core::config::DetectionConfig;
use reelmark_core::debug_log::{self, DebugEvent, SharedEventLog};
use reelmark_detect::{EmissionGate, PageSource, ResolverRegistry};

use crate::relay::{RelayMessage, ViewingRelay};

/// Delays and intervals driving a detection loop.
#[derive(Debug, Clone)]
pub struct DetectionTimings {
    pub initial_delay: Duration,
    pub mutation_debounce: Duration,
    pub periodic_interval: Duration,
    pub url_poll: Duration,
    pub navigation_delay: Duration,
    pub cooldown: Duration,
    pub retry_grace: Duration,
}

impl DetectionTimings {
    pub fn from_config(cfg: &DetectionConfig) -> Self {
        Self {
            initial_delay: cfg.initial_delay(),
            mutation_debounce: cfg.mutation_debounce(),
            periodic_interval: cfg.periodic_interval(),
            url_poll: cfg.url_poll(),
            navigation_delay: cfg.navigation_delay(),
            cooldown: cfg.cooldown(),
            retry_grace: cfg.retry_grace(),
        }
    }
}

impl Default for DetectionTimings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            mutation_debounce: Duration::from_millis(500),
            periodic_interval: Duration::from_secs(10),
            url_poll: Duration::from_secs(1),
            navigation_delay: Duration::from_millis(1500),
            cooldown: reelmark_detect::DEFAULT_COOLDOWN,
            retry_grace: Duration::from_secs(15),
        }
    }
}

/// Something the host observed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// The document changed.
    Mutation,
    /// History navigation (back/forward).
    PopState,
}

#[derive(Debug)]
struct SessionState {
    gate: EmissionGate,
    active: bool,
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// A running detection loop.
pub struct DetectionHandle {
    task: JoinHandle<()>,
    state: Arc<Mutex<SessionState>>,
}

impl DetectionHandle {
    /// Stop the loop. In-flight relay calls are abandoned and no further
    /// checks run.
    pub fn stop(&self) {
        lock(&self.state).active = false;
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active && !self.task.is_finished()
    }

    /// The title the gate currently considers reported.
    pub fn last_title(&self) -> Option<String> {
        lock(&self.state).gate.last_title().map(str::to_string)
    }
}

impl Drop for DetectionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct DetectionLoop<P, R> {
    page: Arc<P>,
    relay: Arc<R>,
    registry: Arc<ResolverRegistry>,
    timings: DetectionTimings,
    state: Arc<Mutex<SessionState>>,
    log: SharedEventLog,
    started: Instant,
    inflight: JoinSet<()>,
}

impl<P, R> DetectionLoop<P, R>
where
    P: PageSource + 'static,
    R: ViewingRelay,
{
    /// Start an active session on `page`.
    pub fn spawn(
        page: Arc<P>,
        relay: Arc<R>,
        registry: Arc<ResolverRegistry>,
        timings: DetectionTimings,
        events: mpsc::UnboundedReceiver<PageEvent>,
        log: SharedEventLog,
    ) -> DetectionHandle {
        let state = Arc::new(Mutex::new(SessionState {
            gate: EmissionGate::new(timings.cooldown),
            active: true,
        }));
        let detection = Self {
            page,
            relay,
            registry,
            timings,
            state: state.clone(),
            log,
            started: Instant::now(),
            inflight: JoinSet::new(),
        };
        let task = tokio::spawn(detection.run(events));
        DetectionHandle { task, state }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<PageEvent>) {
        let t = self.timings.clone();
        let mut initial = Some(self.started + t.initial_delay);
        let mut debounce: Option<Instant> = None;
        let mut navigation: Option<Instant> = None;

        let mut periodic = interval_at(self.started + t.periodic_interval, t.periodic_interval);
        periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut url_poll = interval_at(self.started + t.url_poll, t.url_poll);
        url_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_href = self.page.href();
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = wait_until(initial) => {
                    initial = None;
                    self.check();
                }
                _ = wait_until(debounce) => {
                    debounce = None;
                    self.check();
                }
                _ = wait_until(navigation) => {
                    navigation = None;
                    self.check();
                }
                _ = periodic.tick() => self.check(),
                _ = url_poll.tick() => {
                    let href = self.page.href();
                    if href != last_href {
                        debug!(from = %last_href, to = %href, "Page URL changed");
                        last_href = href;
                        navigation = Some(self.navigated());
                    }
                }
                event = events.recv(), if events_open => match event {
                    Some(PageEvent::Mutation) => {
                        debounce = Some(Instant::now() + t.mutation_debounce);
                    }
                    Some(PageEvent::PopState) => {
                        last_href = self.page.href();
                        navigation = Some(self.navigated());
                    }
                    None => events_open = false,
                },
                Some(joined) = self.inflight.join_next() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            warn!(error = %e, "Relay task panicked");
                        }
                    }
                }
            }
        }
    }

    /// Forget the reported title and return when to look again.
    fn navigated(&self) -> Instant {
        lock(&self.state).gate.reset_title();
        Instant::now() + self.timings.navigation_delay
    }

    fn check(&mut self) {
        let Some(found) = self.registry.resolve_page(self.page.as_ref()) else {
            return;
        };
        let now = self.started.elapsed();
        let emit = {
            let mut state = lock(&self.state);
            state.active && state.gate.try_emit(&found.title, now)
        };
        if !emit {
            return;
        }

        info!(platform = %found.platform, title = %found.title, "Title detected");
        debug_log::record(
            &self.log,
            DebugEvent::TitleEmitted {
                platform: found.platform,
                title: found.title.clone(),
            },
        );

        let relay = self.relay.clone();
        let state = self.state.clone();
        let log = self.log.clone();
        let grace = self.timings.retry_grace;
        let title = found.title.clone();
        let message = RelayMessage::save(found.title, found.platform, Some(found.href));

        self.inflight.spawn(async move {
            let failure = match relay.emit(message).await {
                Ok(response) if response.success => {
                    debug!(%title, new_entry = response.new_entry, "Relay acknowledged");
                    return;
                }
                Ok(response) => response.error.unwrap_or_else(|| "save rejected".into()),
                Err(e) => e.to_string(),
            };
            warn!(%title, error = %failure, "Relay failed");
            debug_log::record(
                &log,
                DebugEvent::RelayFailed {
                    title: title.clone(),
                    message: failure,
                },
            );

            sleep(grace).await;
            let mut state = lock(&state);
            if state.active && state.gate.clear_if_current(&title) {
                debug!(%title, "Title cleared for retry");
            }
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

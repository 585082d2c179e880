//! Session supervision: run the detection loop only while signed in.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use reelmark_core::debug_log::{self, DebugEvent, SharedEventLog};
use reelmark_core::models::AuthSession;
use reelmark_detect::{PageSource, ResolverRegistry};

use crate::db::StoreHandle;
use crate::detection::{DetectionHandle, DetectionLoop, DetectionTimings, PageEvent};
use crate::relay::ViewingRelay;

/// Where the current sign-in comes from.
pub trait SessionSource: Send + Sync + 'static {
    /// The usable session, if any.
    fn current(&self) -> impl Future<Output = Option<AuthSession>> + Send;
}

/// Reads the stored session and drops it once it is older than the
/// freshness window.
#[derive(Clone)]
pub struct SessionGate {
    store: StoreHandle,
    freshness: chrono::Duration,
}

impl SessionGate {
    pub fn new(store: StoreHandle, freshness: chrono::Duration) -> Self {
        Self { store, freshness }
    }
}

impl SessionSource for SessionGate {
    async fn current(&self) -> Option<AuthSession> {
        let session = match self.store.auth_session().await {
            Ok(session) => session?,
            Err(e) => {
                warn!(error = %e, "Failed to read session");
                return None;
            }
        };
        if session.is_fresh(Utc::now(), self.freshness) {
            return Some(session);
        }
        info!(user = session.user_id(), "Session expired, signing out");
        if let Err(e) = self.store.clear_auth_session().await {
            warn!(error = %e, "Failed to clear expired session");
        }
        None
    }
}

/// Handle to a running tracker.
pub struct TrackerHandle {
    events: mpsc::UnboundedSender<PageEvent>,
    active: Arc<std::sync::atomic::AtomicBool>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    /// Forward a page event to the detection loop. Dropped while inactive.
    pub fn page_event(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Stop supervising and tear down any running detection loop.
    pub fn stop(&self) {
        self.task.abort();
        self.active.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polls a [`SessionSource`] and starts or stops detection on a page.
pub struct Tracker;

impl Tracker {
    pub fn spawn<P, R, S>(
        page: Arc<P>,
        relay: Arc<R>,
        registry: Arc<ResolverRegistry>,
        sessions: S,
        timings: DetectionTimings,
        poll: Duration,
        log: SharedEventLog,
    ) -> TrackerHandle
    where
        P: PageSource + 'static,
        R: ViewingRelay,
        S: SessionSource,
    {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<PageEvent>();
        let active = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = active.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut running: Option<(DetectionHandle, mpsc::UnboundedSender<PageEvent>)> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let signed_in = sessions.current().await.is_some();
                        match (signed_in, running.is_some()) {
                            (true, false) => {
                                let (tx, rx) = mpsc::unbounded_channel();
                                let handle = DetectionLoop::spawn(
                                    page.clone(),
                                    relay.clone(),
                                    registry.clone(),
                                    timings.clone(),
                                    rx,
                                    log.clone(),
                                );
                                running = Some((handle, tx));
                                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                                info!("Session found, detection started");
                                debug_log::record(&log, DebugEvent::SessionChanged { active: true });
                            }
                            (false, true) => {
                                if let Some((handle, _)) = running.take() {
                                    handle.stop();
                                }
                                flag.store(false, std::sync::atomic::Ordering::SeqCst);
                                info!("Session gone, detection stopped");
                                debug_log::record(&log, DebugEvent::SessionChanged { active: false });
                            }
                            _ => {}
                        }
                    }
                    event = events_rx.recv() => {
                        let Some(event) = event else { break };
                        match &running {
                            Some((_, tx)) => {
                                let _ = tx.send(event);
                            }
                            None => debug!(?event, "Page event ignored while inactive"),
                        }
                    }
                }
            }

            if let Some((handle, _)) = running.take() {
                handle.stop();
            }
        });

        TrackerHandle {
            events: events_tx,
            active,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use reelmark_core::debug_log::shared_event_log;
    use reelmark_core::models::SessionUser;
    use reelmark_detect::StaticPage;

    use super::*;
    use crate::relay::{RelayError, RelayMessage, SaveResponse};

    struct Toggle(AtomicBool);

    impl SessionSource for Arc<Toggle> {
        async fn current(&self) -> Option<AuthSession> {
            self.0.load(Ordering::SeqCst).then(|| AuthSession {
                access_token: "t".into(),
                refresh_token: None,
                user: SessionUser {
                    id: "u1".into(),
                    email: None,
                },
                established_at: Utc::now(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ViewingRelay for Recorder {
        async fn emit(&self, message: RelayMessage) -> Result<SaveResponse, RelayError> {
            self.0.lock().unwrap().push(message.title().to_string());
            Ok(SaveResponse::created())
        }
    }

    fn netflix_page() -> Arc<StaticPage> {
        Arc::new(
            StaticPage::new("https://www.netflix.com/watch/80100172")
                .with_text(r#"[data-uia="video-title"]"#, "Dark"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn detection_follows_session() {
        let toggle = Arc::new(Toggle(AtomicBool::new(false)));
        let relay = Arc::new(Recorder::default());
        let handle = Tracker::spawn(
            netflix_page(),
            relay.clone(),
            Arc::new(ResolverRegistry::embedded()),
            toggle.clone(),
            DetectionTimings::default(),
            Duration::from_secs(5),
            shared_event_log(),
        );

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!handle.is_active());
        assert!(relay.0.lock().unwrap().is_empty());

        toggle.0.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(handle.is_active());
        assert_eq!(relay.0.lock().unwrap().as_slice(), ["Dark"]);

        toggle.0.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!handle.is_active());
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn page_events_reach_only_an_active_loop() {
        let toggle = Arc::new(Toggle(AtomicBool::new(true)));
        let relay = Arc::new(Recorder::default());
        let handle = Tracker::spawn(
            netflix_page(),
            relay.clone(),
            Arc::new(ResolverRegistry::embedded()),
            toggle.clone(),
            DetectionTimings::default(),
            Duration::from_secs(5),
            shared_event_log(),
        );

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(relay.0.lock().unwrap().as_slice(), ["Dark"]);
        handle.page_event(PageEvent::PopState);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(relay.0.lock().unwrap().as_slice(), ["Dark", "Dark"]);

        toggle.0.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!handle.is_active());
        handle.page_event(PageEvent::PopState);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(relay.0.lock().unwrap().len(), 2);
        handle.stop();
    }

    #[tokio::test]
    async fn stale_session_is_cleared() {
        let store = StoreHandle::open_memory().unwrap();
        store
            .save_auth_session(AuthSession {
                access_token: "t".into(),
                refresh_token: None,
                user: SessionUser {
                    id: "u1".into(),
                    email: None,
                },
                established_at: Utc::now() - chrono::Duration::hours(25),
            })
            .await
            .unwrap();
        let gate = SessionGate::new(store.clone(), chrono::Duration::hours(24));

        assert!(gate.current().await.is_none());
        assert!(store.auth_session().await.unwrap().is_none());
    }
}

pub mod background;
pub mod detection;
pub mod metadata;
pub mod relay;
pub mod sync;
pub mod tracker;

mod db;

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use reelmark_api::supabase::SupabaseClient;
use reelmark_api::tmdb::TmdbClient;
use reelmark_core::config::AppConfig;
use reelmark_core::credentials::{CredentialError, Credentials};
use reelmark_core::debug_log::{self, DebugEvent, EventEntry, SharedEventLog};
use reelmark_core::error::ReelmarkError;
use reelmark_core::history::{self, HistoryCounts, HistoryQuery};
use reelmark_core::models::{AuthSession, Rating, RecordKey, SessionUser, WatchRecord};
use reelmark_detect::{PageSource, ResolverRegistry};

pub use reelmark_api::traits::{AuthService, MetadataCatalog, RecordStore, SignUpOutcome};

pub use background::{spawn_background, BackgroundHandle};
pub use db::StoreHandle;
pub use detection::{DetectionHandle, DetectionLoop, DetectionTimings, PageEvent};
pub use metadata::{CoverInfo, MetadataResolver};
pub use relay::{RelayError, RelayHandle, RelayMessage, SaveResponse, ViewingRelay};
pub use sync::{reconcile, ReconcileReport, RemoteSync, SyncError};
pub use tracker::{SessionGate, SessionSource, Tracker, TrackerHandle};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("{0}")]
    Auth(String),
    #[error(transparent)]
    Validation(#[from] CredentialError),
    #[error("not signed in")]
    NotSignedIn,
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ReelmarkError> for RuntimeError {
    fn from(e: ReelmarkError) -> Self {
        match e {
            ReelmarkError::NotFound(what) => Self::NotFound(what),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<SyncError> for RuntimeError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Remote(message) => Self::Api(message),
            SyncError::Local(e) => e.into(),
        }
    }
}

/// Snapshot for the `status` view.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub session: Option<AuthSession>,
    pub counts: HistoryCounts,
    pub recent_events: Vec<EventEntry>,
}

/// Everything the tracker needs, wired together.
pub struct Runtime<B, M> {
    config: AppConfig,
    store: StoreHandle,
    backend: Arc<B>,
    sync: Arc<RemoteSync<B>>,
    metadata: Arc<MetadataResolver<M>>,
    registry: Arc<ResolverRegistry>,
    sessions: SessionGate,
    log: SharedEventLog,
}

impl Runtime<SupabaseClient, TmdbClient> {
    /// Open the on-disk store and build the HTTP clients from `config`.
    pub fn open(config: AppConfig) -> Result<Self, RuntimeError> {
        let db_path =
            AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let store = StoreHandle::open(&db_path)
            .map_err(|e| RuntimeError::Database(e.to_string()))?;

        let backend = SupabaseClient::new(&config.backend.url, config.backend.anon_key.clone())
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        let catalog = TmdbClient::new(&config.metadata.base_url, config.metadata.api_key.clone())
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        if config.metadata.api_key.is_empty() {
            warn!("No metadata API key configured, cover lookups will fail");
        }

        Ok(Self::new(config, store, backend, catalog, load_registry()?))
    }
}

/// The embedded platform database with the user's overrides applied.
pub fn load_registry() -> Result<ResolverRegistry, RuntimeError> {
    let mut registry = ResolverRegistry::embedded();
    let user_path = AppConfig::platforms_path();
    if user_path.exists() {
        let user_str = std::fs::read_to_string(&user_path)
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        let user_db = ResolverRegistry::from_toml(&user_str)
            .map_err(|e| RuntimeError::Config(format!("{}: {e}", user_path.display())))?;
        registry.merge_user(&user_db);
        debug!(path = %user_path.display(), platforms = registry.len(), "Merged user platforms");
    }
    Ok(registry)
}

impl<B, M> Runtime<B, M>
where
    B: AuthService + RecordStore + 'static,
    M: MetadataCatalog + 'static,
{
    pub fn new(
        config: AppConfig,
        store: StoreHandle,
        backend: B,
        catalog: M,
        registry: ResolverRegistry,
    ) -> Self {
        let backend = Arc::new(backend);
        Self {
            sync: Arc::new(RemoteSync::new(backend.clone(), store.clone())),
            metadata: Arc::new(MetadataResolver::new(
                catalog,
                config.metadata.image_base.clone(),
            )),
            sessions: SessionGate::new(store.clone(), config.session.freshness()),
            registry: Arc::new(registry),
            log: debug_log::shared_event_log(),
            backend,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> StoreHandle {
        self.store.clone()
    }

    pub fn registry(&self) -> Arc<ResolverRegistry> {
        self.registry.clone()
    }

    pub fn event_log(&self) -> SharedEventLog {
        self.log.clone()
    }

    // ── Account ─────────────────────────────────────────────────────

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, RuntimeError> {
        let credentials = Credentials::new(email, password);
        credentials.validate_sign_in()?;

        let grant = self
            .backend
            .sign_in(&credentials.email, &credentials.password)
            .await
            .map_err(|e| RuntimeError::Auth(e.to_string()))?;

        let session = AuthSession {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            user: SessionUser {
                id: grant.user_id,
                email: grant.email.or(Some(credentials.email)),
            },
            established_at: Utc::now(),
        };
        self.store
            .save_auth_session(session.clone())
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;

        info!(user = session.user_id(), "Signed in");
        debug_log::record(&self.log, DebugEvent::SessionChanged { active: true });
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, RuntimeError> {
        let credentials = Credentials::new(email, password);
        credentials.validate_sign_up()?;

        let outcome = self
            .backend
            .sign_up(&credentials.email, &credentials.password)
            .await
            .map_err(|e| RuntimeError::Auth(e.to_string()))?;
        info!(email = %credentials.email, ?outcome, "Account created");
        Ok(outcome)
    }

    pub async fn sign_out(&self) -> Result<(), RuntimeError> {
        self.store
            .clear_auth_session()
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;
        info!("Signed out");
        debug_log::record(&self.log, DebugEvent::SessionChanged { active: false });
        Ok(())
    }

    /// The current session, if it is still fresh.
    pub async fn session(&self) -> Option<AuthSession> {
        self.sessions.current().await
    }

    async fn require_session(&self) -> Result<AuthSession, RuntimeError> {
        self.session().await.ok_or(RuntimeError::NotSignedIn)
    }

    pub async fn status(&self) -> Result<StatusReport, RuntimeError> {
        let session = self.session().await;
        let records = self.store.watched_records().await?;
        let recent_events = self
            .log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot();
        Ok(StatusReport {
            session,
            counts: history::counts(&records),
            recent_events,
        })
    }

    // ── History ─────────────────────────────────────────────────────

    /// The dashboard view. When signed in, remote records are reconciled
    /// in first; an unreachable backend leaves the local list as is.
    pub async fn history(
        &self,
        query: &HistoryQuery,
    ) -> Result<(Vec<WatchRecord>, HistoryCounts), RuntimeError> {
        if let Some(session) = self.session().await {
            if let Err(e) = self.refresh(&session).await {
                warn!(error = %e, "Could not refresh from backend, showing local records");
            }
        }
        let records = self.store.watched_records().await?;
        let rows = query.apply(&records).into_iter().cloned().collect();
        Ok((rows, history::counts(&records)))
    }

    /// Set or clear a rating. The remote copy is updated when signed in;
    /// a remote failure is logged and the local change kept.
    pub async fn rate(
        &self,
        key: RecordKey,
        rating: Option<Rating>,
    ) -> Result<WatchRecord, RuntimeError> {
        let record = self.store.set_rating(key, rating).await?;
        if let Some(session) = self.session().await {
            if let Err(e) = self.sync.set_rating(&record, &session).await {
                warn!(title = %record.title, error = %e, "Remote rating update failed");
            }
        }
        Ok(record)
    }

    /// Delete one record locally and, when signed in, remotely.
    pub async fn delete(&self, key: RecordKey) -> Result<WatchRecord, RuntimeError> {
        let record = self
            .store
            .delete_record(key.clone())
            .await?
            .ok_or_else(|| RuntimeError::NotFound(key.to_string()))?;
        if let Some(session) = self.session().await {
            if let Err(e) = self.sync.delete(&record, &session).await {
                warn!(title = %record.title, error = %e, "Remote delete failed");
            }
        }
        info!(%key, "Record deleted");
        Ok(record)
    }

    /// Delete every record. Signed out, only the local list is cleared.
    pub async fn clear_all(&self) -> Result<(), RuntimeError> {
        match self.session().await {
            Some(session) => self.sync.clear_all(&session).await?,
            None => self.store.clear_records().await?,
        }
        Ok(())
    }

    // ── Sync ────────────────────────────────────────────────────────

    /// Pull and reconcile, then push records the server has never seen.
    pub async fn sync(&self) -> Result<ReconcileReport, RuntimeError> {
        let session = self.require_session().await?;
        let report = self.refresh(&session).await?;

        let unsynced: Vec<WatchRecord> = self
            .store
            .watched_records()
            .await?
            .into_iter()
            .filter(|r| r.remote_id.is_none())
            .collect();
        for record in &unsynced {
            if let Err(e) = self.sync.push(record, &session).await {
                warn!(title = %record.title, error = %e, "Push failed");
            }
        }
        Ok(report)
    }

    async fn refresh(&self, session: &AuthSession) -> Result<ReconcileReport, RuntimeError> {
        let report = self.sync.pull_and_reconcile(session).await?;
        debug_log::record(
            &self.log,
            DebugEvent::Reconciled {
                added: report.added,
                updated: report.updated,
            },
        );
        Ok(report)
    }

    /// Look up covers for up to `limit` records missing one (the configured
    /// limit when `None`). Returns how many were filled.
    pub async fn backfill_covers(&self, limit: Option<usize>) -> Result<usize, RuntimeError> {
        let limit = limit.unwrap_or(self.config.sync.cover_backfill_limit);
        let pending: Vec<RecordKey> = self
            .store
            .watched_records()
            .await?
            .iter()
            .filter(|r| !r.has_cover())
            .take(limit)
            .map(WatchRecord::key)
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let lookups = pending.iter().map(|key| self.metadata.resolve(&key.title));
        let found = join_all(lookups).await;

        let session = self.session().await;
        let mut filled = 0;
        for (key, info) in pending.into_iter().zip(found) {
            debug_log::record(
                &self.log,
                DebugEvent::CoverLookup {
                    title: key.title.clone(),
                    found: info.cover_url.is_some(),
                },
            );
            if info.is_empty() {
                continue;
            }
            let Some(record) = self
                .store
                .backfill_cover(key, info.cover_url, info.release_year)
                .await?
            else {
                continue;
            };
            filled += 1;
            if let Some(session) = &session {
                if let Err(e) = self.sync.push(&record, session).await {
                    warn!(title = %record.title, error = %e, "Cover push failed");
                }
            }
        }
        info!(filled, "Cover backfill finished");
        Ok(filled)
    }

    // ── Background ──────────────────────────────────────────────────

    /// Start the processor that saves relayed viewings.
    pub fn start_background(&self) -> (RelayHandle, BackgroundHandle) {
        spawn_background(
            self.store.clone(),
            self.metadata.clone(),
            self.sync.clone(),
            self.sessions.clone(),
            self.log.clone(),
        )
    }

    /// Watch `page`, detecting titles while signed in.
    pub fn start_tracker<P, R>(&self, page: Arc<P>, relay: Arc<R>) -> TrackerHandle
    where
        P: PageSource + 'static,
        R: ViewingRelay,
    {
        Tracker::spawn(
            page,
            relay,
            self.registry.clone(),
            self.sessions.clone(),
            DetectionTimings::from_config(&self.config.detection),
            self.config.detection.session_poll(),
            self.log.clone(),
        )
    }
}

//! Pushing local records to the hosted store and folding remote rows back in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use reelmark_api::records::{NewRemoteRecord, RecordPatch, RemoteRecord};
use reelmark_api::traits::{RecordFilter, RecordStore};
use reelmark_core::debug_log::{self, DebugEvent, SharedEventLog};
use reelmark_core::error::ReelmarkError;
use reelmark_core::models::{AuthSession, Platform, Rating, RecordKey, WatchRecord};

use crate::db::StoreHandle;
use crate::tracker::SessionSource;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("remote store error: {0}")]
    Remote(String),
    #[error(transparent)]
    Local(#[from] ReelmarkError),
}

/// What a push did on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Created,
    Updated,
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Remote-only records added locally.
    pub added: usize,
    /// Local records advanced by newer remote values.
    pub updated: usize,
    /// Local records that learned their server id.
    pub linked: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.linked > 0
    }
}

/// Merge `remote` rows into `local`.
///
/// Records are matched by title (the last local record with that title).
/// View count and last-watched only move forward; when either advances the
/// platform follows the remote row. Remote-only rows are added. Nothing local
/// is ever removed.
pub fn reconcile(
    local: &mut Vec<WatchRecord>,
    remote: &[RemoteRecord],
    now: DateTime<Utc>,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for row in remote {
        if row.title.is_empty() {
            continue;
        }
        match local.iter().rposition(|r| r.title == row.title) {
            Some(idx) => {
                let mut advanced = false;
                let record = &mut local[idx];
                if let Some(count) = row.view_count.filter(|c| *c > record.view_count) {
                    record.view_count = count;
                    advanced = true;
                }
                if let Some(at) = row.last_watched.filter(|at| *at > record.last_watched_at) {
                    record.last_watched_at = at.max(record.first_watched_at);
                    advanced = true;
                }
                if record.remote_id.is_none() {
                    record.remote_id = Some(row.id.clone());
                    report.linked += 1;
                }
                if advanced {
                    report.updated += 1;
                    let platform = row.platform.as_deref().and_then(|p| p.parse::<Platform>().ok());
                    if let Some(platform) = platform.filter(|p| *p != local[idx].platform) {
                        let key = RecordKey::new(row.title.clone(), platform);
                        if local.iter().any(|r| r.matches(&key)) {
                            debug!(title = %row.title, %platform, "Platform change would duplicate a record");
                        } else {
                            local[idx].platform = platform;
                        }
                    }
                }
            }
            None => {
                local.push(from_remote(row, now));
                report.added += 1;
            }
        }
    }

    report
}

fn from_remote(row: &RemoteRecord, now: DateTime<Utc>) -> WatchRecord {
    let first = row.watched_at.unwrap_or(now);
    let last = row.last_watched.unwrap_or(first).max(first);
    WatchRecord {
        title: row.title.clone(),
        platform: row
            .platform
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(Platform::Netflix),
        first_watched_at: first,
        last_watched_at: last,
        view_count: row.view_count.unwrap_or(1).max(1),
        cover_url: row.cover_url.clone().filter(|c| !c.is_empty()),
        release_year: row.release_year.clone(),
        source_url: row.movie_url.clone(),
        rating: row.rating.and_then(Rating::from_stored),
        remote_id: Some(row.id.clone()),
    }
}

/// Remote filter addressing `record`: by id when known, else title + user.
fn filter_for(record: &WatchRecord, session: &AuthSession) -> RecordFilter {
    match &record.remote_id {
        Some(id) => RecordFilter::Id(id.clone()),
        None => RecordFilter::Title {
            user_id: session.user_id().to_string(),
            title: record.title.clone(),
        },
    }
}

/// Remote operations on behalf of the signed-in user.
pub struct RemoteSync<S> {
    remote: Arc<S>,
    local: StoreHandle,
}

impl<S: RecordStore> RemoteSync<S> {
    pub fn new(remote: Arc<S>, local: StoreHandle) -> Self {
        Self { remote, local }
    }

    /// Create the record remotely, or patch it if it already has a server id.
    pub async fn push(
        &self,
        record: &WatchRecord,
        session: &AuthSession,
    ) -> Result<PushOutcome, SyncError> {
        let token = &session.access_token;
        if record.remote_id.is_none() {
            let row = NewRemoteRecord {
                title: record.title.clone(),
                user_id: session.user_id().to_string(),
                view_count: record.view_count,
                watched_at: record.first_watched_at,
                last_watched: record.last_watched_at,
                platform: record.platform.as_str().to_string(),
                cover_url: record.cover_url.clone(),
                release_year: record.release_year.clone(),
                movie_url: record.source_url.clone(),
                rating: record.rating.map(Rating::value),
            };
            let stored = self
                .remote
                .insert(token, &row)
                .await
                .map_err(|e| SyncError::Remote(e.to_string()))?;
            self.local.set_remote_id(record.key(), stored.id).await?;
            info!(title = %record.title, "Record created remotely");
            return Ok(PushOutcome::Created);
        }

        let filter = RecordFilter::Title {
            user_id: session.user_id().to_string(),
            title: record.title.clone(),
        };
        let patch = RecordPatch {
            view_count: Some(record.view_count),
            last_watched: Some(record.last_watched_at),
            platform: Some(record.platform.as_str().to_string()),
            cover_url: record.cover_url.clone(),
            release_year: record.release_year.clone(),
            movie_url: record.source_url.clone(),
            ..Default::default()
        };
        self.remote
            .update(token, &filter, &patch)
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;
        info!(title = %record.title, view_count = record.view_count, "Record updated remotely");
        Ok(PushOutcome::Updated)
    }

    /// Every remote row owned by the user.
    pub async fn pull(&self, session: &AuthSession) -> Result<Vec<RemoteRecord>, SyncError> {
        let rows = self
            .remote
            .select(
                &session.access_token,
                &RecordFilter::User(session.user_id().to_string()),
            )
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;
        debug!(count = rows.len(), "Pulled remote records");
        Ok(rows)
    }

    pub async fn pull_and_reconcile(
        &self,
        session: &AuthSession,
    ) -> Result<ReconcileReport, SyncError> {
        let rows = self.pull(session).await?;
        let report = self.local.reconcile(rows).await?;
        info!(
            added = report.added,
            updated = report.updated,
            linked = report.linked,
            "Reconciled with remote"
        );
        Ok(report)
    }

    /// Empty the local list, then delete the user's remote rows.
    ///
    /// The local clear happens even when the remote delete fails; that
    /// failure is still returned.
    pub async fn clear_all(&self, session: &AuthSession) -> Result<(), SyncError> {
        self.local.clear_records().await?;
        self.remote
            .delete(
                &session.access_token,
                &RecordFilter::User(session.user_id().to_string()),
            )
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;
        info!("Cleared all records");
        Ok(())
    }

    pub async fn delete(&self, record: &WatchRecord, session: &AuthSession) -> Result<(), SyncError> {
        self.remote
            .delete(&session.access_token, &filter_for(record, session))
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))
    }

    pub async fn set_rating(
        &self,
        record: &WatchRecord,
        session: &AuthSession,
    ) -> Result<(), SyncError> {
        let patch = RecordPatch {
            rating: Some(record.rating.map(Rating::value).unwrap_or(0)),
            is_favorite: Some(record.is_favorite()),
            ..Default::default()
        };
        self.remote
            .update(&session.access_token, &filter_for(record, session), &patch)
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))
    }
}

/// Background worker pushing queued records one at a time.
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<RecordKey>,
    worker: JoinHandle<()>,
}

impl SyncQueue {
    pub fn spawn<S, G>(sync: Arc<RemoteSync<S>>, sessions: G, log: SharedEventLog) -> Self
    where
        S: RecordStore + 'static,
        G: SessionSource,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<RecordKey>();
        let worker = tokio::spawn(async move {
            while let Some(key) = rx.recv().await {
                let Some(session) = sessions.current().await else {
                    debug!(%key, "No session, dropping sync");
                    continue;
                };
                // Re-read so the push carries the latest local state.
                let record = match sync.local.record(key.clone()).await {
                    Ok(Some(record)) => record,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(%key, error = %e, "Sync read failed");
                        continue;
                    }
                };
                match sync.push(&record, &session).await {
                    Ok(outcome) => debug_log::record(
                        &log,
                        DebugEvent::SyncPushed {
                            title: record.title.clone(),
                            created: outcome == PushOutcome::Created,
                        },
                    ),
                    Err(e) => {
                        warn!(%key, error = %e, "Sync failed");
                        debug_log::record(
                            &log,
                            DebugEvent::Error {
                                source: "sync".into(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }
        });
        Self { tx, worker }
    }

    pub fn enqueue(&self, key: RecordKey) {
        let _ = self.tx.send(key);
    }

    /// Stop accepting work and wait for queued pushes to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Sync worker ended abnormally");
        }
    }
}

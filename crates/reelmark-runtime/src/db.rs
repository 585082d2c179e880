use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use reelmark_api::records::RemoteRecord;
use reelmark_core::error::ReelmarkError;
use reelmark_core::models::{AuthSession, Rating, RecordKey, ViewingEvent, WatchRecord};
use reelmark_core::orchestrator::UpsertOutcome;
use reelmark_core::storage::Storage;

use crate::sync::{self, ReconcileReport};

type Reply<T> = oneshot::Sender<Result<T, ReelmarkError>>;

/// Handle to the store actor. Every read-modify-write runs on one thread,
/// so concurrent callers never interleave inside an update.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<StoreCommand>,
}

enum StoreCommand {
    WatchedRecords {
        reply: Reply<Vec<WatchRecord>>,
    },
    Record {
        key: RecordKey,
        reply: Reply<Option<WatchRecord>>,
    },
    RecordViewing {
        event: ViewingEvent,
        reply: Reply<(UpsertOutcome, WatchRecord)>,
    },
    BackfillCover {
        key: RecordKey,
        cover_url: Option<String>,
        release_year: Option<String>,
        reply: Reply<Option<WatchRecord>>,
    },
    SetRemoteId {
        key: RecordKey,
        remote_id: String,
        reply: Reply<bool>,
    },
    SetRating {
        key: RecordKey,
        rating: Option<Rating>,
        reply: Reply<WatchRecord>,
    },
    DeleteRecord {
        key: RecordKey,
        reply: Reply<Option<WatchRecord>>,
    },
    ClearRecords {
        reply: Reply<()>,
    },
    Reconcile {
        remote: Vec<RemoteRecord>,
        reply: Reply<ReconcileReport>,
    },
    AuthSession {
        reply: Reply<Option<AuthSession>>,
    },
    SaveAuthSession {
        session: Box<AuthSession>,
        reply: Reply<()>,
    },
    ClearAuthSession {
        reply: Reply<()>,
    },
}

impl StoreHandle {
    pub fn open(path: &Path) -> Result<Self, ReelmarkError> {
        let storage = Storage::open(path)
            .inspect_err(|e| tracing::error!("Failed to open database: {e}"))?;
        Self::spawn(storage)
    }

    /// In-memory store (for tests and dry runs).
    pub fn open_memory() -> Result<Self, ReelmarkError> {
        Self::spawn(Storage::open_memory()?)
    }

    fn spawn(storage: Storage) -> Result<Self, ReelmarkError> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("store-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .inspect_err(|e| tracing::error!("Failed to spawn store thread: {e}"))?;

        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> StoreCommand,
    ) -> Result<T, ReelmarkError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply));
        rx.await
            .unwrap_or_else(|_| Err(ReelmarkError::StoreClosed))
    }

    pub async fn watched_records(&self) -> Result<Vec<WatchRecord>, ReelmarkError> {
        self.request(|reply| StoreCommand::WatchedRecords { reply })
            .await
    }

    pub async fn record(&self, key: RecordKey) -> Result<Option<WatchRecord>, ReelmarkError> {
        self.request(|reply| StoreCommand::Record { key, reply })
            .await
    }

    pub async fn record_viewing(
        &self,
        event: ViewingEvent,
    ) -> Result<(UpsertOutcome, WatchRecord), ReelmarkError> {
        self.request(|reply| StoreCommand::RecordViewing { event, reply })
            .await
    }

    pub async fn backfill_cover(
        &self,
        key: RecordKey,
        cover_url: Option<String>,
        release_year: Option<String>,
    ) -> Result<Option<WatchRecord>, ReelmarkError> {
        self.request(|reply| StoreCommand::BackfillCover {
            key,
            cover_url,
            release_year,
            reply,
        })
        .await
    }

    pub async fn set_remote_id(
        &self,
        key: RecordKey,
        remote_id: String,
    ) -> Result<bool, ReelmarkError> {
        self.request(|reply| StoreCommand::SetRemoteId {
            key,
            remote_id,
            reply,
        })
        .await
    }

    pub async fn set_rating(
        &self,
        key: RecordKey,
        rating: Option<Rating>,
    ) -> Result<WatchRecord, ReelmarkError> {
        self.request(|reply| StoreCommand::SetRating { key, rating, reply })
            .await
    }

    pub async fn delete_record(&self, key: RecordKey) -> Result<Option<WatchRecord>, ReelmarkError> {
        self.request(|reply| StoreCommand::DeleteRecord { key, reply })
            .await
    }

    pub async fn clear_records(&self) -> Result<(), ReelmarkError> {
        self.request(|reply| StoreCommand::ClearRecords { reply })
            .await
    }

    /// Merge remote rows into the local list in one step.
    pub async fn reconcile(&self, remote: Vec<RemoteRecord>) -> Result<ReconcileReport, ReelmarkError> {
        self.request(|reply| StoreCommand::Reconcile { remote, reply })
            .await
    }

    pub async fn auth_session(&self) -> Result<Option<AuthSession>, ReelmarkError> {
        self.request(|reply| StoreCommand::AuthSession { reply })
            .await
    }

    pub async fn save_auth_session(&self, session: AuthSession) -> Result<(), ReelmarkError> {
        self.request(|reply| StoreCommand::SaveAuthSession {
            session: Box::new(session),
            reply,
        })
        .await
    }

    pub async fn clear_auth_session(&self) -> Result<(), ReelmarkError> {
        self.request(|reply| StoreCommand::ClearAuthSession { reply })
            .await
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<StoreCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            StoreCommand::WatchedRecords { reply } => {
                let _ = reply.send(storage.watched_records());
            }
            StoreCommand::Record { key, reply } => {
                let _ = reply.send(storage.record(&key));
            }
            StoreCommand::RecordViewing { event, reply } => {
                let _ = reply.send(storage.record_viewing(&event));
            }
            StoreCommand::BackfillCover {
                key,
                cover_url,
                release_year,
                reply,
            } => {
                let _ = reply.send(storage.backfill_cover(
                    &key,
                    cover_url.as_deref(),
                    release_year.as_deref(),
                ));
            }
            StoreCommand::SetRemoteId {
                key,
                remote_id,
                reply,
            } => {
                let _ = reply.send(storage.set_remote_id(&key, &remote_id));
            }
            StoreCommand::SetRating { key, rating, reply } => {
                let _ = reply.send(storage.set_rating(&key, rating));
            }
            StoreCommand::DeleteRecord { key, reply } => {
                let _ = reply.send(storage.delete_record(&key));
            }
            StoreCommand::ClearRecords { reply } => {
                let _ = reply.send(storage.clear_records());
            }
            StoreCommand::Reconcile { remote, reply } => {
                let result = storage.watched_records().and_then(|mut records| {
                    let report = sync::reconcile(&mut records, &remote, chrono::Utc::now());
                    if report.changed() {
                        storage.save_watched_records(&records)?;
                    }
                    Ok(report)
                });
                let _ = reply.send(result);
            }
            StoreCommand::AuthSession { reply } => {
                let _ = reply.send(storage.auth_session());
            }
            StoreCommand::SaveAuthSession { session, reply } => {
                let _ = reply.send(storage.save_auth_session(&session));
            }
            StoreCommand::ClearAuthSession { reply } => {
                let _ = reply.send(storage.clear_auth_session());
            }
        }
    }
}

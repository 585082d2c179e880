//! The background processor behind the relay channel.
//!
//! Saves each viewing through the store actor, answers the page, then runs
//! the cover lookup and the remote push off the reply path.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use reelmark_api::traits::{MetadataCatalog, RecordStore};
use reelmark_core::debug_log::{self, DebugEvent, SharedEventLog};
use reelmark_core::models::{RecordKey, ViewingEvent};
use reelmark_core::orchestrator::UpsertOutcome;

use crate::db::StoreHandle;
use crate::metadata::MetadataResolver;
use crate::relay::{RelayHandle, RelayMessage, RelayRequest, SaveResponse};
use crate::sync::{RemoteSync, SyncQueue};
use crate::tracker::SessionSource;

/// Control handle for the background processor.
pub struct BackgroundHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl BackgroundHandle {
    /// Stop taking new messages, answer the ones already queued, then wait
    /// for cover lookups and remote pushes to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Background processor ended abnormally");
        }
    }
}

struct Processor<C, G> {
    store: StoreHandle,
    metadata: Arc<MetadataResolver<C>>,
    sessions: G,
    queue: SyncQueue,
    log: SharedEventLog,
    /// Cover lookups; each yields the key to push afterwards, if any.
    side: JoinSet<Option<RecordKey>>,
}

/// Start the processor. Returns the relay the detection side talks to.
pub fn spawn_background<C, S, G>(
    store: StoreHandle,
    metadata: Arc<MetadataResolver<C>>,
    sync: Arc<RemoteSync<S>>,
    sessions: G,
    log: SharedEventLog,
) -> (RelayHandle, BackgroundHandle)
where
    C: MetadataCatalog + 'static,
    S: RecordStore + 'static,
    G: SessionSource + Clone,
{
    let (relay, rx) = RelayHandle::channel();
    let (shutdown, shutdown_rx) = oneshot::channel();
    let processor = Processor {
        queue: SyncQueue::spawn(sync, sessions.clone(), log.clone()),
        store,
        metadata,
        sessions,
        log,
        side: JoinSet::new(),
    };
    let task = tokio::spawn(processor.run(rx, shutdown_rx));
    (relay, BackgroundHandle { shutdown, task })
}

impl<C, G> Processor<C, G>
where
    C: MetadataCatalog + 'static,
    G: SessionSource,
{
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<RelayRequest>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                request = rx.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
                Some(joined) = self.side.join_next() => self.side_finished(joined),
            }
        }

        rx.close();
        while let Some(request) = rx.recv().await {
            self.handle(request).await;
        }
        while let Some(joined) = self.side.join_next().await {
            self.side_finished(joined);
        }
        self.queue.shutdown().await;
        debug!("Background processor stopped");
    }

    async fn handle(&mut self, request: RelayRequest) {
        let RelayMessage::SaveMovie {
            title,
            platform,
            source_url,
        } = request.message;
        let event = ViewingEvent::now(title, platform, source_url);

        let (outcome, record) = match self.store.record_viewing(event).await {
            Ok(saved) => saved,
            Err(e) => {
                error!(error = %e, "Failed to save viewing");
                debug_log::record(
                    &self.log,
                    DebugEvent::Error {
                        source: "store".into(),
                        message: e.to_string(),
                    },
                );
                let _ = request.reply.send(SaveResponse::failed(e.to_string()));
                return;
            }
        };

        let response = match outcome {
            UpsertOutcome::Created => SaveResponse::created(),
            UpsertOutcome::Updated { view_count } => SaveResponse::updated(view_count),
        };
        let _ = request.reply.send(response);

        info!(
            title = %record.title,
            platform = %record.platform,
            view_count = record.view_count,
            new = outcome.is_new(),
            "Viewing saved"
        );
        debug_log::record(
            &self.log,
            DebugEvent::Saved {
                platform: record.platform,
                title: record.title.clone(),
                outcome,
            },
        );

        let signed_in = self.sessions.current().await.is_some();

        if !record.has_cover() {
            let metadata = self.metadata.clone();
            let store = self.store.clone();
            let log = self.log.clone();
            let key = record.key();
            self.side.spawn(async move {
                let info = metadata.resolve(&key.title).await;
                debug_log::record(
                    &log,
                    DebugEvent::CoverLookup {
                        title: key.title.clone(),
                        found: info.cover_url.is_some(),
                    },
                );
                if info.is_empty() {
                    return None;
                }
                match store
                    .backfill_cover(key.clone(), info.cover_url, info.release_year)
                    .await
                {
                    Ok(Some(_)) => signed_in.then_some(key),
                    Ok(None) => None,
                    Err(e) => {
                        error!(%key, error = %e, "Failed to store cover");
                        None
                    }
                }
            });
        }

        if signed_in {
            self.queue.enqueue(record.key());
        }
    }

    fn side_finished(&self, joined: Result<Option<RecordKey>, tokio::task::JoinError>) {
        match joined {
            Ok(Some(key)) => self.queue.enqueue(key),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Cover lookup task failed"),
        }
    }
}

//! Message channel between the page-side detection loop and the background
//! processor.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use reelmark_core::models::Platform;

/// A request sent from the page side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RelayMessage {
    SaveMovie {
        title: String,
        platform: Platform,
        #[serde(
            rename = "sourceUrl",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        source_url: Option<String>,
    },
}

impl RelayMessage {
    pub fn save(title: impl Into<String>, platform: Platform, source_url: Option<String>) -> Self {
        Self::SaveMovie {
            title: title.into(),
            platform,
            source_url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::SaveMovie { title, .. } => title,
        }
    }
}

/// Reply to a [`RelayMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default)]
    pub new_entry: bool,
    /// Set when an existing record was bumped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResponse {
    pub fn created() -> Self {
        Self {
            success: true,
            new_entry: true,
            view_count: None,
            error: None,
        }
    }

    pub fn updated(view_count: u32) -> Self {
        Self {
            success: true,
            new_entry: false,
            view_count: Some(view_count),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            new_entry: false,
            view_count: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("background processor is not running")]
    Closed,
    #[error("save rejected: {0}")]
    Rejected(String),
}

/// Delivers viewing events to whatever persists them.
pub trait ViewingRelay: Send + Sync + 'static {
    fn emit(
        &self,
        message: RelayMessage,
    ) -> impl Future<Output = Result<SaveResponse, RelayError>> + Send;
}

/// One in-flight request: the message and where to send the reply.
pub(crate) struct RelayRequest {
    pub message: RelayMessage,
    pub reply: oneshot::Sender<SaveResponse>,
}

/// Sending side of the relay channel.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<RelayRequest>,
}

impl RelayHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<RelayRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ViewingRelay for RelayHandle {
    async fn emit(&self, message: RelayMessage) -> Result<SaveResponse, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RelayRequest { message, reply })
            .map_err(|_| RelayError::Closed)?;
        let response = rx.await.map_err(|_| RelayError::Closed)?;
        if response.success {
            Ok(response)
        } else {
            Err(RelayError::Rejected(
                response.error.unwrap_or_else(|| "unknown error".into()),
            ))
        }
    }
}

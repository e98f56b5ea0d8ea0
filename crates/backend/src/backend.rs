use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

use crate::events::CouncilEvent;
use crate::model::Conversation;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    /// Longest silence tolerated between two stream events.
    pub idle_timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// One message hand-off to the council.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouncilRequest {
    pub conversation_id: String,
    pub content: String,
    pub images: Vec<String>,
}

impl CouncilRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        content: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: content.into(),
            images,
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type BackendWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("backend base URL is empty"))]
    MissingBaseUrl { stage: &'static str },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("council server returned status {status} on `{stage}`: {body}"))]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode council payload on `{stage}`, {source}"))]
    DecodePayload {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("council stream for conversation '{conversation_id}' failed: {message}"))]
    Stream {
        stage: &'static str,
        conversation_id: String,
        message: String,
    },
}

/// Receiving half of one council request.
///
/// Dropping the stream signals cancellation to its worker.
pub struct CouncilEventStream {
    conversation_id: String,
    events: mpsc::UnboundedReceiver<CouncilEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct CouncilStreamHandle {
    pub stream: CouncilEventStream,
    pub worker: BackendWorker,
}

impl CouncilEventStream {
    pub(crate) fn new(
        conversation_id: String,
        events: mpsc::UnboundedReceiver<CouncilEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            conversation_id,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub async fn recv(&mut self) -> Option<CouncilEvent> {
        self.events.recv().await
    }
}

impl Drop for CouncilEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// Transport seam between the chat surface and whatever runs the council.
pub trait CouncilBackend: Send + Sync {
    fn base_url(&self) -> &str;
    fn create_conversation<'a>(&'a self) -> BoxFuture<'a, BackendResult<Conversation>>;
    fn stream_message(&self, request: CouncilRequest) -> BackendResult<CouncilStreamHandle>;
}

pub(crate) fn make_event_stream(
    conversation_id: String,
) -> (
    mpsc::UnboundedSender<CouncilEvent>,
    CouncilEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        CouncilEventStream::new(conversation_id, event_rx, cancel_tx),
        cancel_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_normalizes_trailing_slashes() {
        let config = BackendConfig::new(" http://council.local:8001/ ");

        assert_eq!(config.base_url, "http://council.local:8001");
        assert_eq!(
            config.endpoint("/api/conversations"),
            "http://council.local:8001/api/conversations"
        );
    }

    #[tokio::test]
    async fn dropping_the_stream_signals_cancellation() {
        let (_event_tx, stream, cancel_rx) = make_event_stream("c1".to_string());

        drop(stream);

        assert!(cancel_rx.await.is_ok());
    }
}

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};

use crate::backend::{
    BackendConfig, BackendError, BackendResult, BackendWorker, BoxFuture, CouncilBackend,
    CouncilRequest, CouncilStreamHandle, DecodePayloadSnafu, HttpClientSnafu, MissingBaseUrlSnafu,
    UnexpectedStatusSnafu, make_event_stream,
};
use crate::events::{CouncilEvent, parse_wire_event};
use crate::model::{Conversation, SendMessageRequest};

const CONVERSATIONS_PATH: &str = "api/conversations";

/// Talks to the council server over JSON + Server-Sent Events.
pub struct HttpCouncilBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpCouncilBackend {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        ensure!(
            !config.base_url.is_empty(),
            MissingBaseUrlSnafu {
                stage: "http-backend-new",
            }
        );

        let client = reqwest::Client::builder()
            .build()
            .context(HttpClientSnafu {
                stage: "build-client",
            })?;

        Ok(Self { config, client })
    }

    async fn fetch_new_conversation(&self) -> BackendResult<Conversation> {
        let response = self
            .client
            .post(self.config.endpoint(CONVERSATIONS_PATH))
            .json(&serde_json::json!({}))
            .send()
            .await
            .context(HttpClientSnafu {
                stage: "send-create-conversation",
            })?;

        let status = response.status();
        let payload = response.text().await.context(HttpClientSnafu {
            stage: "read-create-conversation",
        })?;

        if !status.is_success() {
            return UnexpectedStatusSnafu {
                stage: "create-conversation-status",
                status: status.as_u16(),
                body: payload,
            }
            .fail();
        }

        serde_json::from_str(&payload).context(DecodePayloadSnafu {
            stage: "decode-conversation",
        })
    }

    async fn open_stream(
        client: &reqwest::Client,
        config: &BackendConfig,
        request: &CouncilRequest,
    ) -> BackendResult<reqwest::Response> {
        let url = config.endpoint(&format!(
            "{CONVERSATIONS_PATH}/{}/message/stream",
            request.conversation_id
        ));
        let body = SendMessageRequest {
            content: request.content.clone(),
            images: request.images.clone(),
        };

        let response = client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .context(HttpClientSnafu {
                stage: "open-stream",
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return UnexpectedStatusSnafu {
                stage: "open-stream-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response)
    }

    fn emit_error_event(event_tx: &mpsc::UnboundedSender<CouncilEvent>, error: BackendError) {
        let _ = event_tx.send(CouncilEvent::Error(error.to_string()));
    }

    async fn run_stream_worker(
        client: reqwest::Client,
        config: BackendConfig,
        request: CouncilRequest,
        event_tx: mpsc::UnboundedSender<CouncilEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let conversation_id = request.conversation_id.clone();
        let response = match Self::open_stream(&client, &config, &request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(
                    conversation_id = %conversation_id,
                    error = %error,
                    "failed to open council stream"
                );
                Self::emit_error_event(&event_tx, error);
                return;
            }
        };

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let mut cancelled = false;
        let mut terminal_sent = false;

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    cancelled = true;
                    tracing::debug!(conversation_id = %conversation_id, "council stream cancelled");
                    break;
                }
                next_item = tokio::time::timeout(config.idle_timeout, events.next()) => {
                    match next_item {
                        Err(_) => {
                            terminal_sent = true;
                            Self::emit_error_event(&event_tx, BackendError::Stream {
                                stage: "stream-idle-timeout",
                                conversation_id: conversation_id.clone(),
                                message: format!(
                                    "no event within {}s",
                                    config.idle_timeout.as_secs()
                                ),
                            });
                            break;
                        }
                        Ok(None) => break,
                        Ok(Some(Err(source))) => {
                            terminal_sent = true;
                            tracing::warn!(
                                conversation_id = %conversation_id,
                                error = %source,
                                "council stream emitted a transport error"
                            );
                            Self::emit_error_event(&event_tx, BackendError::Stream {
                                stage: "stream-chunk",
                                conversation_id: conversation_id.clone(),
                                message: source.to_string(),
                            });
                            break;
                        }
                        Ok(Some(Ok(sse))) => {
                            if sse.data.trim().is_empty() {
                                continue;
                            }

                            match parse_wire_event(&sse.data) {
                                Ok(Some(event)) => {
                                    let terminal = event.is_terminal();
                                    if event_tx.send(event).is_err() {
                                        return;
                                    }
                                    if terminal {
                                        terminal_sent = true;
                                        break;
                                    }
                                }
                                Ok(None) => {
                                    tracing::trace!(data = %sse.data, "skipping unknown council event");
                                }
                                Err(error) => {
                                    tracing::warn!(
                                        conversation_id = %conversation_id,
                                        error = %error,
                                        "failed to parse council event"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        if !cancelled && !terminal_sent {
            Self::emit_error_event(
                &event_tx,
                BackendError::Stream {
                    stage: "stream-closed",
                    conversation_id,
                    message: "stream ended before the council completed".to_string(),
                },
            );
        }
    }
}

impl CouncilBackend for HttpCouncilBackend {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn create_conversation<'a>(&'a self) -> BoxFuture<'a, BackendResult<Conversation>> {
        Box::pin(self.fetch_new_conversation())
    }

    fn stream_message(&self, request: CouncilRequest) -> BackendResult<CouncilStreamHandle> {
        let (event_tx, stream, cancel_rx) = make_event_stream(request.conversation_id.clone());
        let worker: BackendWorker = Box::pin(Self::run_stream_worker(
            self.client.clone(),
            self.config.clone(),
            request,
            event_tx,
            cancel_rx,
        ));

        Ok(CouncilStreamHandle { stream, worker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stage;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(events: &[&str]) -> String {
        events
            .iter()
            .map(|event| format!("data: {event}\n\n"))
            .collect()
    }

    async fn collect_events(backend: &HttpCouncilBackend, conversation_id: &str) -> Vec<CouncilEvent> {
        let handle = backend
            .stream_message(CouncilRequest::new(conversation_id, "hello", Vec::new()))
            .expect("stream handle");
        let CouncilStreamHandle { mut stream, worker } = handle;
        tokio::spawn(worker);

        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn create_conversation_decodes_server_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "c-42",
                "created_at": "2024-01-01T00:00:00",
                "messages": []
            })))
            .mount(&server)
            .await;

        let backend = HttpCouncilBackend::new(BackendConfig::new(server.uri())).unwrap();
        let conversation = backend.create_conversation().await.unwrap();

        assert_eq!(conversation.id, "c-42");
        assert!(conversation.messages.is_empty());
    }

    #[tokio::test]
    async fn create_conversation_reports_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let backend = HttpCouncilBackend::new(BackendConfig::new(server.uri())).unwrap();
        let error = backend.create_conversation().await.unwrap_err();

        assert!(matches!(
            error,
            BackendError::UnexpectedStatus { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn stream_maps_sse_events_in_order() {
        let server = MockServer::start().await;
        let body = sse_body(&[
            r#"{"type":"stage1_start"}"#,
            r#"{"type":"stage1_complete","data":[{"model":"a/one","response":"hi"}]}"#,
            r#"{"type":"keepalive"}"#,
            r#"{"type":"stage2_start"}"#,
            r#"{"type":"complete"}"#,
        ]);
        Mock::given(method("POST"))
            .and(path("/api/conversations/c-1/message/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let backend = HttpCouncilBackend::new(BackendConfig::new(server.uri())).unwrap();
        let events = collect_events(&backend, "c-1").await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], CouncilEvent::StageStarted(Stage::One));
        assert!(matches!(events[1], CouncilEvent::Stage1Complete(ref data) if data.len() == 1));
        assert_eq!(events[2], CouncilEvent::StageStarted(Stage::Two));
        assert_eq!(events[3], CouncilEvent::Complete);
    }

    #[tokio::test]
    async fn stream_without_terminal_event_ends_with_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conversations/c-2/message/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[r#"{"type":"stage1_start"}"#]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let backend = HttpCouncilBackend::new(BackendConfig::new(server.uri())).unwrap();
        let events = collect_events(&backend, "c-2").await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events.last(), Some(CouncilEvent::Error(_))));
    }

    #[tokio::test]
    async fn rejected_stream_surfaces_as_single_error_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conversations/missing/message/stream"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Conversation not found"))
            .mount(&server)
            .await;

        let backend = HttpCouncilBackend::new(BackendConfig::new(server.uri())).unwrap();
        let events = collect_events(&backend, "missing").await;

        assert_eq!(events.len(), 1);
        let CouncilEvent::Error(message) = &events[0] else {
            panic!("expected error event");
        };
        assert!(message.contains("404"));
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(matches!(
            HttpCouncilBackend::new(BackendConfig::new("  ")),
            Err(BackendError::MissingBaseUrl { .. })
        ));
    }
}

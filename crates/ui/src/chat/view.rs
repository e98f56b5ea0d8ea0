use std::sync::Arc;

use council_backend::{
    BackendResult, BackendWorker, CouncilBackend, CouncilEvent, CouncilEventStream,
    CouncilRequest, CouncilStreamHandle,
};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use gpui_tokio_bridge::{JoinError, Tokio};

use crate::chat::events::{CouncilFailed, Submit, TitleChanged};
use crate::chat::message::Conversation;
use crate::chat::thread::{apply_council_event, begin_turn, rollback_turn};
use crate::chat::view_model::plan;
use crate::chat::{MessageInput, MessageList};

/// Owns the current conversation and the in-flight council request.
///
/// Every change publishes a fresh `Arc<Conversation>` snapshot to the list, which never
/// mutates what it is given.
pub struct ChatView {
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    backend: Option<Arc<dyn CouncilBackend>>,
    backend_error: Option<String>,
    conversation: Option<Arc<Conversation>>,
    is_loading: bool,
    create_task: Option<Task<()>>,
    stream_worker_task: Option<Task<Result<(), JoinError>>>,
    stream_reader_task: Option<Task<()>>,
}

impl EventEmitter<CouncilFailed> for ChatView {}
impl EventEmitter<TitleChanged> for ChatView {}

impl ChatView {
    pub fn new(
        backend: BackendResult<Arc<dyn CouncilBackend>>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        let (backend, backend_error) = match backend {
            Ok(backend) => {
                tracing::info!(base_url = backend.base_url(), "council backend ready");
                (Some(backend), None)
            }
            Err(error) => {
                tracing::error!(error = %error, "council backend unavailable");
                (None, Some(error.to_string()))
            }
        };

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        Self {
            message_list,
            message_input,
            backend,
            backend_error,
            conversation: None,
            is_loading: false,
            create_task: None,
            stream_worker_task: None,
            stream_reader_task: None,
        }
    }

    /// Asks the backend for a fresh conversation and shows it once it exists.
    pub fn create_conversation(&mut self, cx: &mut Context<Self>) {
        let Some(backend) = self.backend.clone() else {
            self.report_missing_backend(cx);
            return;
        };

        let create = Tokio::spawn(cx, async move { backend.create_conversation().await });
        self.create_task = Some(cx.spawn(async move |this, cx| {
            let result = create.await;
            let _ = this.update(cx, |this, cx| {
                this.create_task = None;
                match result {
                    Ok(Ok(conversation)) => this.open_conversation(conversation, cx),
                    Ok(Err(error)) => {
                        tracing::error!(error = %error, "failed to create conversation");
                        this.report_failure(format!("Failed to create conversation: {error}"), cx);
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "create conversation task did not finish");
                        this.report_failure("Failed to create conversation".to_string(), cx);
                    }
                }
            });
        }));
    }

    fn open_conversation(&mut self, conversation: Conversation, cx: &mut Context<Self>) {
        if self.is_loading {
            tracing::info!("abandoning in-flight request for new conversation");
            self.cancel_active_stream();
        }

        tracing::info!(conversation_id = %conversation.id, "opened conversation");
        cx.emit(TitleChanged {
            title: conversation.title.clone(),
        });
        self.is_loading = false;
        self.conversation = Some(Arc::new(conversation));
        self.sync_children(cx);
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        if self.is_loading {
            tracing::debug!("ignoring submit while a request is in flight");
            return;
        }

        let Some(conversation_id) = self
            .conversation
            .as_ref()
            .map(|conversation| conversation.id.clone())
        else {
            tracing::debug!("ignoring submit without a conversation");
            return;
        };

        let Some(backend) = self.backend.clone() else {
            self.report_missing_backend(cx);
            return;
        };

        self.publish(cx, |conversation| {
            begin_turn(conversation, &event.text, &event.images);
        });
        self.set_loading(true, cx);

        tracing::info!(
            conversation_id = %conversation_id,
            images = event.images.len(),
            "sending message to council"
        );
        let request = CouncilRequest::new(conversation_id, event.text, event.images);
        match backend.stream_message(request) {
            Ok(handle) => self.spawn_stream_pipeline(handle, cx),
            Err(error) => {
                tracing::error!(error = %error, "failed to start council request");
                self.publish(cx, |conversation| {
                    rollback_turn(conversation);
                });
                self.set_loading(false, cx);
                self.report_failure(format!("Failed to send message: {error}"), cx);
            }
        }
    }

    fn spawn_stream_pipeline(&mut self, handle: CouncilStreamHandle, cx: &mut Context<Self>) {
        self.spawn_stream_worker(handle.worker, cx);
        self.spawn_stream_reader(handle.stream, cx);
    }

    fn spawn_stream_worker(&mut self, worker: BackendWorker, cx: &mut Context<Self>) {
        self.stream_worker_task = Some(Tokio::spawn(cx, worker));
    }

    fn spawn_stream_reader(&mut self, mut stream: CouncilEventStream, cx: &mut Context<Self>) {
        self.stream_reader_task = Some(cx.spawn(async move |this, cx| {
            while let Some(event) = stream.recv().await {
                let _ = this.update(cx, |this, cx| {
                    this.handle_stream_event(event, cx);
                });
            }
            tracing::debug!(conversation_id = stream.conversation_id(), "council stream closed");

            let _ = this.update(cx, |this, cx| {
                this.handle_stream_reader_closed(cx);
            });
        }));
    }

    fn handle_stream_event(&mut self, event: CouncilEvent, cx: &mut Context<Self>) {
        if !self.is_loading {
            return;
        }

        tracing::debug!(event = event_name(&event), "council event");
        let mut effect = None;
        self.publish(cx, |conversation| {
            effect = Some(apply_council_event(conversation, &event));
        });
        let Some(effect) = effect else {
            return;
        };

        if let Some(title) = effect.title {
            cx.emit(TitleChanged { title });
        }
        if let Some(error) = effect.error {
            tracing::warn!(error = %error, "council request failed");
            self.report_failure(error, cx);
        }
        if effect.finished {
            self.set_loading(false, cx);
        }
    }

    fn handle_stream_reader_closed(&mut self, cx: &mut Context<Self>) {
        self.stream_worker_task = None;
        self.stream_reader_task = None;

        if self.is_loading {
            // The backend always ends with a terminal event; fold a synthetic one in otherwise.
            self.handle_stream_event(
                CouncilEvent::Error("council stream ended before completing".to_string()),
                cx,
            );
        }
    }

    fn cancel_active_stream(&mut self) {
        // Dropping the reader drops the event stream, which signals the worker to stop.
        self.stream_reader_task = None;
        self.stream_worker_task = None;
    }

    fn set_loading(&mut self, loading: bool, cx: &mut Context<Self>) {
        self.is_loading = loading;
        self.sync_children(cx);
    }

    /// Replaces the conversation with an edited copy so observers see a new snapshot.
    fn publish(&mut self, cx: &mut Context<Self>, edit: impl FnOnce(&mut Conversation)) {
        let Some(current) = self.conversation.as_ref() else {
            return;
        };

        let mut next = Conversation::clone(current);
        edit(&mut next);
        self.conversation = Some(Arc::new(next));
        self.sync_children(cx);
    }

    fn sync_children(&mut self, cx: &mut Context<Self>) {
        let conversation = self.conversation.clone();
        let is_loading = self.is_loading;
        let show_composer = plan(conversation.as_deref(), is_loading).shows_composer();

        self.message_list.update(cx, |list, cx| {
            list.set_state(conversation, is_loading, cx);
        });
        self.message_input.update(cx, |input, cx| {
            input.set_loading(is_loading, cx);
            input.set_visible(show_composer, cx);
        });
        cx.notify();
    }

    fn report_missing_backend(&mut self, cx: &mut Context<Self>) {
        let reason = self
            .backend_error
            .clone()
            .unwrap_or_else(|| "no backend configured".to_string());
        self.report_failure(format!("Council backend unavailable: {reason}"), cx);
    }

    fn report_failure(&mut self, message: String, cx: &mut Context<Self>) {
        cx.emit(CouncilFailed { message });
    }
}

fn event_name(event: &CouncilEvent) -> &'static str {
    match event {
        CouncilEvent::StageStarted(_) => "stage_started",
        CouncilEvent::Stage1Complete(_) => "stage1_complete",
        CouncilEvent::Stage2Complete { .. } => "stage2_complete",
        CouncilEvent::Stage3Complete(_) => "stage3_complete",
        CouncilEvent::TitleComplete(_) => "title_complete",
        CouncilEvent::Complete => "complete",
        CouncilEvent::Error(_) => "error",
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let show_composer = self.message_input.read(cx).is_visible();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone()),
            )
            .when(show_composer, |view| {
                view.child(
                    div()
                        .id("chat-view-message-input")
                        .flex_shrink_0()
                        .w_full()
                        .border_t_1()
                        .border_color(theme.border)
                        .child(self.message_input.clone()),
                )
            })
    }
}

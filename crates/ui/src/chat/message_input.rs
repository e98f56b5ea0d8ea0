use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable as _, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};
use gpui_tokio_bridge::Tokio;

use crate::chat::composer::{ComposerController, ComposerKey, KeyOutcome, OutgoingMessage};
use crate::chat::events::Submit;
use crate::chat::image_cache::ImageCache;
use crate::chat::ingest::{Candidate, IngestOutcome, IngestSource, ingest_batch};
use crate::chat::paste::PasteListener;

pub const COMPOSER_PLACEHOLDER: &str =
    "Ask your question or paste images (Cmd+V)... (Shift+Enter for new line, Enter to send)";

/// Text box, attachment tray and send button.
pub struct MessageInput {
    input_state: Entity<InputState>,
    pub(super) composer: ComposerController,
    pub(super) image_cache: ImageCache,
    is_loading: bool,
    pending_newline: bool,
    /// Input value seen before a plain Enter reached the input.
    text_before_enter: Option<String>,
    decoding_batches: usize,
    paste_listener: Option<PasteListener>,
}

impl EventEmitter<Submit> for MessageInput {}

impl MessageInput {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder(COMPOSER_PLACEHOLDER)
                .clean_on_escape()
                .auto_grow(3, 10)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| match event {
                InputEvent::PressEnter { secondary } => {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter inserts the newline itself and the input still reports
                        // PressEnter afterwards.
                        this.pending_newline = false;
                    } else {
                        this.handle_enter(window, cx);
                    }
                }
                _ => {
                    this.sync_text(cx);
                    cx.notify();
                }
            },
        )
        .detach();

        Self {
            input_state,
            composer: ComposerController::new(),
            image_cache: ImageCache::new(),
            is_loading: false,
            pending_newline: false,
            text_before_enter: None,
            decoding_batches: 0,
            paste_listener: None,
        }
    }

    pub fn set_loading(&mut self, loading: bool, cx: &mut Context<Self>) {
        self.is_loading = loading;
        if loading {
            self.pending_newline = false;
        }
        cx.notify();
    }

    /// Shows or hides the composer. The paste listener lives exactly as long as it is visible.
    pub fn set_visible(&mut self, visible: bool, cx: &mut Context<Self>) {
        match (visible, self.paste_listener.is_some()) {
            (true, false) => {
                let input = cx.weak_entity();
                self.paste_listener = Some(PasteListener::acquire(input, cx));
            }
            (false, true) => self.paste_listener = None,
            _ => {}
        }
    }

    pub fn is_visible(&self) -> bool {
        self.paste_listener.is_some()
    }

    pub(super) fn is_decoding(&self) -> bool {
        self.decoding_batches > 0
    }

    /// Decodes a batch off the UI thread and appends it in one step once every file settled.
    pub fn ingest(
        &mut self,
        source: IngestSource,
        candidates: Vec<Candidate>,
        cx: &mut Context<Self>,
    ) {
        if candidates.is_empty() {
            return;
        }

        tracing::debug!(source = source.label(), count = candidates.len(), "decoding images");
        self.decoding_batches += 1;
        cx.notify();

        let decode = Tokio::spawn(cx, ingest_batch(source, candidates));
        cx.spawn(async move |this, cx| {
            let outcome = decode.await;
            let _ = this.update(cx, |this, cx| {
                this.commit_batch(outcome, cx);
            });
        })
        .detach();
    }

    fn commit_batch(
        &mut self,
        outcome: Result<IngestOutcome, gpui_tokio_bridge::JoinError>,
        cx: &mut Context<Self>,
    ) {
        self.decoding_batches = self.decoding_batches.saturating_sub(1);

        match outcome {
            Ok(outcome) => {
                tracing::info!(
                    source = outcome.source.label(),
                    attached = outcome.attachments.len(),
                    skipped = outcome.failures.len(),
                    "attached images"
                );
                self.composer.append_attachments(outcome.attachments);
            }
            Err(error) => {
                tracing::warn!(error = %error, "image decode task did not finish");
            }
        }

        cx.notify();
    }

    pub(super) fn remove_attachment(&mut self, index: usize, cx: &mut Context<Self>) {
        if self.composer.remove_attachment(index).is_none() {
            return;
        }

        let live = self
            .composer
            .attachments()
            .iter()
            .map(|attachment| attachment.key);
        self.image_cache.retain(live);
        cx.notify();
    }

    fn sync_text(&mut self, cx: &mut Context<Self>) {
        let value = self.input_state.read(cx).value().to_string();
        self.composer.set_text(value);
    }

    fn handle_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let current = self.input_state.read(cx).value().to_string();
        let text = text_without_enter_newline(self.text_before_enter.take(), &current);
        if text != current {
            self.input_state.update(cx, |state, cx| {
                state.set_value(text.clone(), window, cx);
            });
        }
        self.composer.set_text(text);

        if let KeyOutcome::Submitted(message) =
            self.composer.handle_key(ComposerKey::Enter, self.is_loading)
        {
            self.dispatch(message, window, cx);
        }
    }

    fn handle_shift_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self
            .composer
            .handle_key(ComposerKey::ShiftEnter, self.is_loading)
            != KeyOutcome::InsertNewline
        {
            return;
        }

        self.pending_newline = true;
        self.input_state.update(cx, |state, cx| {
            state.insert("\n", window, cx);
        });
        cx.notify();
    }

    fn handle_send_click(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.sync_text(cx);
        if let Some(message) = self.composer.submit(self.is_loading) {
            self.dispatch(message, window, cx);
        }
    }

    fn dispatch(&mut self, message: OutgoingMessage, window: &mut Window, cx: &mut Context<Self>) {
        tracing::debug!(images = message.images.len(), "composer submitted");

        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.pending_newline = false;
        self.text_before_enter = None;
        self.image_cache.retain(std::iter::empty());

        cx.emit(Submit::from(message));
        cx.notify();
    }

}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let is_loading = self.is_loading;
        let can_submit = self.composer.can_submit(is_loading);
        let is_decoding = self.is_decoding();
        let image_upload = self.render_image_upload(cx).into_any_element();
        let theme = cx.theme();

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .child(image_upload)
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .capture_key_down(cx.listener(|this, event: &KeyDownEvent, _window, cx| {
                        let modifiers = &event.keystroke.modifiers;
                        if event.keystroke.key == "enter" && !modifiers.shift && !modifiers.secondary() {
                            this.text_before_enter =
                                Some(this.input_state.read(cx).value().to_string());
                        }
                    }))
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        if event.keystroke.key == "enter" && event.keystroke.modifiers.shift {
                            this.handle_shift_enter(window, cx);
                        }
                    }))
                    .child(Input::new(&self.input_state).w_full().disabled(is_loading)),
            )
            .child(
                h_flex()
                    .w_full()
                    .items_center()
                    .justify_between()
                    .child(div().when(is_decoding, |row| {
                        row.child(
                            Label::new("Reading images...")
                                .text_xs()
                                .text_color(theme.muted_foreground),
                        )
                    }))
                    .child(
                        Button::new("send")
                            .small()
                            .primary()
                            .icon(IconName::ArrowUp)
                            .child("Send")
                            .disabled(!can_submit)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.handle_send_click(window, cx);
                            })),
                    ),
            )
    }
}

/// Text to submit for a plain Enter.
///
/// The input inserts the newline at the cursor before reporting `PressEnter`, so the value
/// captured ahead of the keystroke wins. Without one, a single trailing newline is dropped.
fn text_without_enter_newline(captured: Option<String>, current: &str) -> String {
    match captured {
        Some(text) => text,
        None => current.strip_suffix('\n').unwrap_or(current).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[::core::prelude::v1::test]
    fn enter_in_the_middle_submits_text_captured_before_the_newline() {
        let text = text_without_enter_newline(Some("compare these".to_string()), "compare\n these");

        assert_eq!(text, "compare these");
    }

    #[::core::prelude::v1::test]
    fn enter_without_capture_drops_only_the_trailing_newline() {
        assert_eq!(text_without_enter_newline(None, "line one\nline two\n"), "line one\nline two");
        assert_eq!(text_without_enter_newline(None, "no newline"), "no newline");
    }
}

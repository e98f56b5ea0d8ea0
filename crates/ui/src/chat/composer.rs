use crate::chat::message::{Attachment, PendingComposerState};

/// Payload handed to the send callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    /// Data URIs in attachment order.
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerKey {
    Enter,
    ShiftEnter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Submitted(OutgoingMessage),
    InsertNewline,
    Ignored,
}

/// Submit gate and reset rules for the composer, independent of any widget.
#[derive(Debug, Clone, Default)]
pub struct ComposerController {
    state: PendingComposerState,
}

impl ComposerController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.state.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.state.text = text.into();
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.state.attachments.as_slice()
    }

    pub fn append_attachments(&mut self, batch: impl IntoIterator<Item = Attachment>) {
        self.state.attachments.append(batch);
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        self.state.attachments.remove(index)
    }

    pub fn can_submit(&self, is_loading: bool) -> bool {
        !is_loading && !self.state.is_blank()
    }

    /// Drains the composer into an outgoing message when the gate allows it.
    ///
    /// A permitted submit always resets text and attachments, whatever the caller does with
    /// the message afterwards.
    pub fn submit(&mut self, is_loading: bool) -> Option<OutgoingMessage> {
        if !self.can_submit(is_loading) {
            return None;
        }

        let message = OutgoingMessage {
            text: std::mem::take(&mut self.state.text),
            images: self
                .state
                .attachments
                .take_all()
                .into_iter()
                .map(|attachment| attachment.data)
                .collect(),
        };
        self.state.reset();

        Some(message)
    }

    pub fn handle_key(&mut self, key: ComposerKey, is_loading: bool) -> KeyOutcome {
        match key {
            ComposerKey::ShiftEnter if is_loading => KeyOutcome::Ignored,
            ComposerKey::ShiftEnter => KeyOutcome::InsertNewline,
            ComposerKey::Enter => self
                .submit(is_loading)
                .map_or(KeyOutcome::Ignored, KeyOutcome::Submitted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image(name: &str) -> Attachment {
        Attachment::new(format!("data:image/png;base64,{name}"), name, "image/png")
    }

    #[test]
    fn blank_composer_never_submits() {
        let mut composer = ComposerController::new();
        composer.set_text("   \n\t");

        assert!(!composer.can_submit(false));
        assert_eq!(composer.submit(false), None);
        assert_eq!(composer.text(), "   \n\t");
    }

    #[test]
    fn loading_blocks_submit_and_keeps_state() {
        let mut composer = ComposerController::new();
        composer.set_text("question");
        composer.append_attachments([image("a")]);

        assert_eq!(composer.submit(true), None);
        assert_eq!(composer.handle_key(ComposerKey::Enter, true), KeyOutcome::Ignored);
        assert_eq!(composer.text(), "question");
        assert_eq!(composer.attachments().len(), 1);
    }

    #[test]
    fn attachments_alone_are_enough_to_submit() {
        let mut composer = ComposerController::new();
        composer.append_attachments([image("a"), image("b")]);

        let sent = composer.submit(false);

        assert_eq!(
            sent,
            Some(OutgoingMessage {
                text: String::new(),
                images: vec![
                    "data:image/png;base64,a".to_string(),
                    "data:image/png;base64,b".to_string(),
                ],
            })
        );
    }

    #[test]
    fn permitted_submit_resets_text_and_attachments() {
        let mut composer = ComposerController::new();
        composer.set_text("describe these");
        composer.append_attachments([image("a")]);
        composer.remove_attachment(0);
        composer.append_attachments([image("b")]);

        let sent = composer.submit(false).expect("submit permitted");

        assert_eq!(sent.text, "describe these");
        assert_eq!(sent.images, vec!["data:image/png;base64,b".to_string()]);
        assert_eq!(composer.text(), "");
        assert!(composer.attachments().is_empty());
        assert!(!composer.can_submit(false));
    }

    #[test]
    fn enter_submits_and_shift_enter_inserts_newline() {
        let mut composer = ComposerController::new();
        composer.set_text("hello");

        assert_eq!(
            composer.handle_key(ComposerKey::ShiftEnter, false),
            KeyOutcome::InsertNewline
        );
        assert_eq!(composer.text(), "hello");

        let KeyOutcome::Submitted(sent) = composer.handle_key(ComposerKey::Enter, false) else {
            panic!("enter should submit");
        };
        assert_eq!(sent.text, "hello");
    }

    #[test]
    fn enter_on_blank_composer_is_ignored() {
        let mut composer = ComposerController::new();

        assert_eq!(composer.handle_key(ComposerKey::Enter, false), KeyOutcome::Ignored);
    }
}

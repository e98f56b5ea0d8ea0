pub use council_backend::{
    AggregateRanking, Conversation, LoadingFlags, Message, Role, Stage, StageMetadata,
    StageOneResponse, StageThreeResult, StageTwoRanking,
};

use crate::chat::attachments::AttachmentStore;
use crate::chat::image_cache::ImageKey;

/// One pending image, encoded and ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// `data:<mime>;base64,<payload>` of the original bytes.
    pub data: String,
    /// Display-only name.
    pub name: String,
    /// MIME type, e.g. `image/png`.
    pub mime: String,
    /// Preview cache key for `data`.
    pub key: ImageKey,
}

impl Attachment {
    pub fn new(data: impl Into<String>, name: impl Into<String>, mime: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            key: ImageKey::of(&data),
            data,
            name: name.into(),
            mime: mime.into(),
        }
    }
}

/// Text and attachments typed into the composer but not yet sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingComposerState {
    pub text: String,
    pub attachments: AttachmentStore,
}

impl PendingComposerState {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.attachments.clear();
    }
}

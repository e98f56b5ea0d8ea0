use crate::chat::composer::OutgoingMessage;

/// Emitted by the composer when the user sends a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub text: String,
    /// Data URIs in attachment order.
    pub images: Vec<String>,
}

impl From<OutgoingMessage> for Submit {
    fn from(message: OutgoingMessage) -> Self {
        Self {
            text: message.text,
            images: message.images,
        }
    }
}

/// Emitted by the chat view when a request fails and the user should be told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouncilFailed {
    pub message: String,
}

/// Emitted by the chat view when the conversation title changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleChanged {
    pub title: String,
}

pub mod attachments;
pub mod composer;
/// `data:` URI encoding for attachment bytes.
pub mod data_uri;
/// Event contracts for chat module wiring.
pub mod events;
pub mod image_cache;
mod image_upload;
/// Turning picked, dropped, and pasted files into attachments.
pub mod ingest;
pub mod lanes;
/// Conversation entities and composer state.
pub mod message;
pub mod message_input;
pub mod message_list;
pub mod paste;
pub mod scroll_manager;
pub mod thread;
pub mod view;
/// Render plans derived from a conversation snapshot.
pub mod view_model;

pub use attachments::AttachmentStore;
pub use composer::{ComposerController, ComposerKey, KeyOutcome, OutgoingMessage};
pub use events::{CouncilFailed, Submit, TitleChanged};
pub use ingest::{Candidate, IngestOutcome, IngestSource};
pub use message::{Attachment, Conversation, Message, PendingComposerState, Role, Stage};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll_manager::ScrollManager;
pub use view::ChatView;

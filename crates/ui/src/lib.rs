#![deny(unsafe_code)]

/// Council chat desktop client built with GPUI and gpui-component.
///
/// The window shell lives in [`app`], the conversation surface and composer in [`chat`],
/// and persisted preferences in [`settings`].
pub mod app;
/// Conversation view, composer, and image attachment handling.
pub mod chat;
/// Settings persistence.
pub mod settings;

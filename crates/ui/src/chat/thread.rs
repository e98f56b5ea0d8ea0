use council_backend::CouncilEvent;

use crate::chat::message::{Conversation, Message, Role, Stage};

/// Appends the user turn and the assistant placeholder the council fills in.
pub fn begin_turn(conversation: &mut Conversation, text: &str, images: &[String]) {
    conversation
        .messages
        .push(Message::user(text, images.to_vec()));
    conversation.messages.push(Message::assistant_pending());
}

/// Removes the turn added by [`begin_turn`] when the request never reached the council.
pub fn rollback_turn(conversation: &mut Conversation) -> bool {
    let len = conversation.messages.len();
    let is_fresh_turn = len >= 2
        && conversation.messages[len - 2].role == Role::User
        && conversation.messages[len - 1].role == Role::Assistant
        && !Stage::ALL
            .into_iter()
            .any(|stage| conversation.messages[len - 1].has_stage(stage));
    if is_fresh_turn {
        conversation.messages.truncate(len - 2);
    }
    is_fresh_turn
}

/// What the coordinator has to do after an event was folded in.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventEffect {
    /// No more events will arrive for this request.
    pub finished: bool,
    pub title: Option<String>,
    pub error: Option<String>,
}

/// Folds one stream event into the conversation's in-flight assistant message.
pub fn apply_council_event(conversation: &mut Conversation, event: &CouncilEvent) -> EventEffect {
    if let Some(message) = conversation
        .messages
        .last_mut()
        .filter(|message| message.role == Role::Assistant)
    {
        message.apply_event(event);
    } else {
        tracing::warn!(conversation_id = %conversation.id, "council event without an assistant message");
    }

    match event {
        CouncilEvent::TitleComplete(title) => {
            conversation.title = title.clone();
            EventEffect {
                title: Some(title.clone()),
                ..EventEffect::default()
            }
        }
        CouncilEvent::Complete => EventEffect {
            finished: true,
            ..EventEffect::default()
        },
        CouncilEvent::Error(message) => EventEffect {
            finished: true,
            error: Some(message.clone()),
            ..EventEffect::default()
        },
        CouncilEvent::StageStarted(_)
        | CouncilEvent::Stage1Complete(_)
        | CouncilEvent::Stage2Complete { .. }
        | CouncilEvent::Stage3Complete(_) => EventEffect::default(),
    }
}

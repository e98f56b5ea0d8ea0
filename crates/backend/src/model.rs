use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// One of the three council phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    One,
    Two,
    Three,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::One, Stage::Two, Stage::Three];

    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

/// Chat speaker role as served by the council server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One council member's independent answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOneResponse {
    pub model: String,
    pub response: String,
}

/// One council member's ranking of the anonymized stage 1 answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTwoRanking {
    pub model: String,
    pub ranking: String,
    #[serde(default)]
    pub parsed_ranking: Vec<String>,
}

/// Chairman synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageThreeResult {
    pub model: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRanking {
    pub model: String,
    pub average_rank: f64,
    #[serde(default)]
    pub rankings_count: u32,
}

/// Side-channel data attached to stage 2.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_to_model: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_rankings: Option<Vec<AggregateRanking>>,
}

/// In-flight markers, one per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingFlags {
    #[serde(default)]
    pub stage1: bool,
    #[serde(default)]
    pub stage2: bool,
    #[serde(default)]
    pub stage3: bool,
}

impl LoadingFlags {
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::One => self.stage1,
            Stage::Two => self.stage2,
            Stage::Three => self.stage3,
        }
    }

    pub fn set(&mut self, stage: Stage, loading: bool) {
        match stage {
            Stage::One => self.stage1 = loading,
            Stage::Two => self.stage2 = loading,
            Stage::Three => self.stage3 = loading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage1: Option<Vec<StageOneResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage2: Option<Vec<StageTwoRanking>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage3: Option<StageThreeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<LoadingFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StageMetadata>,
}

impl Message {
    /// Creates a user turn. An empty image list is stored as `None`.
    pub fn user(content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: (!images.is_empty()).then_some(images),
            stage1: None,
            stage2: None,
            stage3: None,
            loading: None,
            metadata: None,
        }
    }

    /// Creates the assistant placeholder that stage events are folded into.
    pub fn assistant_pending() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            images: None,
            stage1: None,
            stage2: None,
            stage3: None,
            loading: Some(LoadingFlags::default()),
            metadata: None,
        }
    }

    pub fn is_loading(&self, stage: Stage) -> bool {
        self.loading.is_some_and(|flags| flags.get(stage))
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        match stage {
            Stage::One => self.stage1.is_some(),
            Stage::Two => self.stage2.is_some(),
            Stage::Three => self.stage3.is_some(),
        }
    }

    pub fn label_to_model(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.label_to_model.as_ref())
    }

    pub fn aggregate_rankings(&self) -> Option<&[AggregateRanking]> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.aggregate_rankings.as_deref())
    }

    pub(crate) fn set_loading(&mut self, stage: Stage, loading: bool) {
        self.loading
            .get_or_insert_with(LoadingFlags::default)
            .set(stage, loading);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            title: default_title(),
            messages: Vec::new(),
        }
    }
}

/// Payload of `POST /api/conversations/{id}/message[/stream]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub images: Vec<String>,
}

fn default_title() -> String {
    DEFAULT_CONVERSATION_TITLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_assistant_message_deserializes_with_defaults() {
        let json = r#"{
            "role": "assistant",
            "stage1": [{"model": "openai/gpt-4o", "response": "Paris"}],
            "loading": {"stage2": true}
        }"#;

        let message: Message = serde_json::from_str(json).expect("valid message");

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "");
        assert!(message.has_stage(Stage::One));
        assert!(!message.has_stage(Stage::Two));
        assert!(message.is_loading(Stage::Two));
        assert!(!message.is_loading(Stage::One));
        assert_eq!(message.label_to_model(), None);
        assert_eq!(message.aggregate_rankings(), None);
    }

    #[test]
    fn conversation_without_title_uses_default() {
        let conversation: Conversation =
            serde_json::from_str(r#"{"id": "abc", "messages": []}"#).expect("valid conversation");

        assert_eq!(conversation.title, DEFAULT_CONVERSATION_TITLE);
        assert!(conversation.messages.is_empty());
    }

    #[test]
    fn user_message_without_images_omits_field() {
        let message = Message::user("hello", Vec::new());
        let value = serde_json::to_value(&message).expect("serializable");

        assert_eq!(value["role"], "user");
        assert!(value.get("images").is_none());
    }

    #[test]
    fn stage_metadata_reads_enrichment_tables() {
        let json = r#"{
            "label_to_model": {"Response A": "openai/gpt-4o", "Response B": "x-ai/grok"},
            "aggregate_rankings": [{"model": "openai/gpt-4o", "average_rank": 1.5, "rankings_count": 2}]
        }"#;

        let metadata: StageMetadata = serde_json::from_str(json).expect("valid metadata");

        let labels = metadata.label_to_model.expect("labels present");
        assert_eq!(labels.get("Response B").map(String::as_str), Some("x-ai/grok"));
        let rankings = metadata.aggregate_rankings.expect("rankings present");
        assert_eq!(rankings[0].rankings_count, 2);
    }
}

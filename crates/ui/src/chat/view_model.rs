//! Pure render plan for the conversation surface.
//!
//! [`plan`] turns `(conversation, is_loading)` into a [`ViewPlan`]; the GPUI list only paints
//! what the plan says. Keeping this free of GPUI lets the empty-state and lane rules be tested
//! without a window.

use std::collections::BTreeMap;

use crate::chat::lanes::MessageLanes;
use crate::chat::message::{AggregateRanking, Conversation, Message, Role, Stage};

pub const WELCOME_TITLE: &str = "Welcome to LLM Council";
pub const WELCOME_HINT: &str = "Create a new conversation to get started";
pub const START_TITLE: &str = "Start a conversation";
pub const START_HINT: &str = "Ask a question to consult the LLM Council";
pub const COUNCIL_LOADING_CAPTION: &str = "Consulting the council...";
pub const USER_LABEL: &str = "You";
pub const ASSISTANT_LABEL: &str = "LLM Council";

pub fn stage_loading_caption(stage: Stage) -> &'static str {
    match stage {
        Stage::One => "Running Stage 1: Collecting individual responses...",
        Stage::Two => "Running Stage 2: Peer rankings...",
        Stage::Three => "Running Stage 3: Final synthesis...",
    }
}

pub fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::One => "Stage 1: Individual Responses",
        Stage::Two => "Stage 2: Peer Rankings",
        Stage::Three => "Stage 3: Final Council Answer",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewPlan<'a> {
    /// No conversation selected.
    Welcome,
    Thread(ThreadPlan<'a>),
}

impl ViewPlan<'_> {
    pub fn shows_composer(&self) -> bool {
        match self {
            Self::Welcome => false,
            Self::Thread(thread) => thread.show_composer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadPlan<'a> {
    pub rows: Vec<RowPlan<'a>>,
    pub show_start_prompt: bool,
    /// The composer is only offered on a conversation with no messages yet.
    pub show_composer: bool,
    pub show_council_loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowPlan<'a> {
    User {
        content: &'a str,
        images: &'a [String],
    },
    Assistant(AssistantPlan<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantPlan<'a> {
    pub lanes: MessageLanes<'a>,
    pub label_to_model: Option<&'a BTreeMap<String, String>>,
    pub aggregate_rankings: Option<&'a [AggregateRanking]>,
}

pub fn plan(conversation: Option<&Conversation>, is_loading: bool) -> ViewPlan<'_> {
    let Some(conversation) = conversation else {
        return ViewPlan::Welcome;
    };

    let is_empty = conversation.messages.is_empty();
    ViewPlan::Thread(ThreadPlan {
        rows: conversation.messages.iter().map(row_plan).collect(),
        show_start_prompt: is_empty,
        show_composer: is_empty,
        show_council_loading: is_loading,
    })
}

fn row_plan(message: &Message) -> RowPlan<'_> {
    match message.role {
        Role::User => RowPlan::User {
            content: &message.content,
            images: message.images.as_deref().unwrap_or_default(),
        },
        Role::Assistant => RowPlan::Assistant(AssistantPlan {
            lanes: MessageLanes::of(message),
            label_to_model: message.label_to_model(),
            aggregate_rankings: message.aggregate_rankings(),
        }),
    }
}

/// `openai/gpt-5` -> `gpt-5`. Names without a provider prefix are returned unchanged.
pub fn short_model_name(model: &str) -> &str {
    model
        .split('/')
        .nth(1)
        .filter(|name| !name.is_empty())
        .unwrap_or(model)
}

/// Replaces anonymous labels ("Response A") with the bold short name of the model behind them.
pub fn deanonymize(text: &str, label_to_model: Option<&BTreeMap<String, String>>) -> String {
    let Some(label_to_model) = label_to_model else {
        return text.to_string();
    };

    // Longer labels first so "Response A" never clobbers a prefix of "Response AB".
    let mut labels = label_to_model.iter().collect::<Vec<_>>();
    labels.sort_by(|(left, _), (right, _)| right.len().cmp(&left.len()));

    labels
        .into_iter()
        .filter(|(label, _)| !label.is_empty())
        .fold(text.to_string(), |result, (label, model)| {
            result.replace(label.as_str(), &format!("**{}**", short_model_name(model)))
        })
}

/// Display name for one entry of a parsed ranking.
pub fn ranking_entry_name(label: &str, label_to_model: Option<&BTreeMap<String, String>>) -> String {
    label_to_model
        .and_then(|mapping| mapping.get(label))
        .map(|model| short_model_name(model).to_string())
        .unwrap_or_else(|| label.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub position: usize,
    pub model: String,
    pub average: String,
    pub votes: String,
}

pub fn aggregate_rows(rankings: &[AggregateRanking]) -> Vec<AggregateRow> {
    rankings
        .iter()
        .enumerate()
        .map(|(index, ranking)| AggregateRow {
            position: index + 1,
            model: short_model_name(&ranking.model).to_string(),
            average: format!("Avg: {:.2}", ranking.average_rank),
            votes: format!("({} votes)", ranking.rankings_count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::{LoadingFlags, StageOneResponse, StageTwoRanking};
    use pretty_assertions::assert_eq;

    fn labels() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Response A".to_string(), "openai/gpt-5".to_string()),
            ("Response B".to_string(), "anthropic/claude-sonnet".to_string()),
        ])
    }

    #[test]
    fn no_conversation_shows_welcome_without_composer() {
        let plan = plan(None, false);

        assert_eq!(plan, ViewPlan::Welcome);
        assert!(!plan.shows_composer());
    }

    #[test]
    fn empty_conversation_offers_composer_and_start_prompt() {
        let conversation = Conversation::new("c-1");

        let ViewPlan::Thread(thread) = plan(Some(&conversation), false) else {
            panic!("expected thread plan");
        };

        assert!(thread.rows.is_empty());
        assert!(thread.show_start_prompt);
        assert!(thread.show_composer);
        assert!(!thread.show_council_loading);
    }

    #[test]
    fn composer_hides_once_a_message_exists() {
        let mut conversation = Conversation::new("c-1");
        conversation.messages.push(Message::user("hi", Vec::new()));
        conversation.messages.push(Message::assistant_pending());

        let plan = plan(Some(&conversation), true);

        assert!(!plan.shows_composer());
        let ViewPlan::Thread(thread) = plan else {
            panic!("expected thread plan");
        };
        assert!(!thread.show_start_prompt);
        assert!(thread.show_council_loading);
        assert_eq!(thread.rows.len(), 2);
    }

    #[test]
    fn user_rows_carry_images_in_order() {
        let mut conversation = Conversation::new("c-1");
        conversation.messages.push(Message::user(
            "look",
            vec!["data:image/png;base64,AA==".to_string(), "data:image/gif;base64,AQ==".to_string()],
        ));

        let ViewPlan::Thread(thread) = plan(Some(&conversation), false) else {
            panic!("expected thread plan");
        };

        let RowPlan::User { content, images } = &thread.rows[0] else {
            panic!("expected user row");
        };
        assert_eq!(*content, "look");
        assert_eq!(images.len(), 2);
        assert!(images[1].starts_with("data:image/gif"));
    }

    #[test]
    fn assistant_row_exposes_lanes_and_enrichments() {
        let mut message = Message::assistant_pending();
        message.stage1 = Some(vec![StageOneResponse {
            model: "openai/gpt-5".to_string(),
            response: "one".to_string(),
        }]);
        message.stage2 = Some(vec![StageTwoRanking {
            model: "openai/gpt-5".to_string(),
            ranking: "Response B is best".to_string(),
            parsed_ranking: vec!["Response B".to_string()],
        }]);
        message.loading = Some(LoadingFlags {
            stage3: true,
            ..LoadingFlags::default()
        });
        let mut conversation = Conversation::new("c-1");
        conversation.messages.push(message);

        let ViewPlan::Thread(thread) = plan(Some(&conversation), true) else {
            panic!("expected thread plan");
        };
        let RowPlan::Assistant(assistant) = &thread.rows[0] else {
            panic!("expected assistant row");
        };

        assert!(assistant.lanes.has_content(Stage::One));
        assert!(assistant.lanes.has_content(Stage::Two));
        assert!(assistant.lanes.shows_indicator(Stage::Three));
        assert_eq!(assistant.label_to_model, None);
        assert_eq!(assistant.aggregate_rankings, None);
    }

    #[test]
    fn short_names_strip_the_provider_prefix() {
        assert_eq!(short_model_name("openai/gpt-5"), "gpt-5");
        assert_eq!(short_model_name("x-ai/grok/beta"), "grok");
        assert_eq!(short_model_name("local-model"), "local-model");
        assert_eq!(short_model_name("dangling/"), "dangling/");
    }

    #[test]
    fn deanonymize_replaces_every_label_occurrence() {
        let mapping = labels();
        let text = "Response B beats Response A. FINAL RANKING: 1. Response B 2. Response A";

        assert_eq!(
            deanonymize(text, Some(&mapping)),
            "**claude-sonnet** beats **gpt-5**. FINAL RANKING: 1. **claude-sonnet** 2. **gpt-5**"
        );
    }

    #[test]
    fn deanonymize_without_mapping_is_identity() {
        assert_eq!(deanonymize("Response A", None), "Response A");
    }

    #[test]
    fn longer_labels_win_over_their_prefixes() {
        let mapping = BTreeMap::from([
            ("Response A".to_string(), "p/alpha".to_string()),
            ("Response AB".to_string(), "p/beta".to_string()),
        ]);

        assert_eq!(
            deanonymize("Response AB then Response A", Some(&mapping)),
            "**beta** then **alpha**"
        );
    }

    #[test]
    fn ranking_entries_fall_back_to_the_label() {
        let mapping = labels();

        assert_eq!(ranking_entry_name("Response A", Some(&mapping)), "gpt-5");
        assert_eq!(ranking_entry_name("Response Z", Some(&mapping)), "Response Z");
        assert_eq!(ranking_entry_name("Response A", None), "Response A");
    }

    #[test]
    fn aggregate_rows_are_numbered_and_rounded() {
        let rows = aggregate_rows(&[
            AggregateRanking {
                model: "anthropic/claude-sonnet".to_string(),
                average_rank: 1.333_333,
                rankings_count: 3,
            },
            AggregateRanking {
                model: "openai/gpt-5".to_string(),
                average_rank: 2.0,
                rankings_count: 3,
            },
        ]);

        assert_eq!(
            rows[0],
            AggregateRow {
                position: 1,
                model: "claude-sonnet".to_string(),
                average: "Avg: 1.33".to_string(),
                votes: "(3 votes)".to_string(),
            }
        );
        assert_eq!(rows[1].position, 2);
        assert_eq!(rows[1].average, "Avg: 2.00");
    }

    #[test]
    fn every_stage_has_a_caption_and_title() {
        for stage in Stage::ALL {
            assert!(stage_loading_caption(stage).contains(&format!("Stage {}", stage.number())));
            assert!(stage_title(stage).starts_with(&format!("Stage {}", stage.number())));
        }
    }
}

use serde::Deserialize;

use crate::model::{
    Message, Stage, StageMetadata, StageOneResponse, StageThreeResult, StageTwoRanking,
};

/// Stage progress for one in-flight council request, mapped out of the wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum CouncilEvent {
    StageStarted(Stage),
    Stage1Complete(Vec<StageOneResponse>),
    Stage2Complete {
        rankings: Vec<StageTwoRanking>,
        metadata: StageMetadata,
    },
    Stage3Complete(StageThreeResult),
    TitleComplete(String),
    Complete,
    Error(String),
}

impl CouncilEvent {
    /// Returns true for events after which the stream carries nothing else.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error(_))
    }
}

#[derive(Debug, Deserialize)]
struct TitlePayload {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Stage1Start,
    Stage1Complete {
        data: Vec<StageOneResponse>,
    },
    Stage2Start,
    Stage2Complete {
        data: Vec<StageTwoRanking>,
        #[serde(default)]
        metadata: StageMetadata,
    },
    Stage3Start,
    Stage3Complete {
        data: StageThreeResult,
    },
    TitleComplete {
        data: TitlePayload,
    },
    Complete,
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Maps one SSE `data:` payload into a council event.
///
/// Unknown event types map to `Ok(None)` so newer servers stay compatible.
pub fn parse_wire_event(data: &str) -> Result<Option<CouncilEvent>, serde_json::Error> {
    let event = match serde_json::from_str::<WireEvent>(data)? {
        WireEvent::Stage1Start => CouncilEvent::StageStarted(Stage::One),
        WireEvent::Stage1Complete { data } => CouncilEvent::Stage1Complete(data),
        WireEvent::Stage2Start => CouncilEvent::StageStarted(Stage::Two),
        WireEvent::Stage2Complete { data, metadata } => CouncilEvent::Stage2Complete {
            rankings: data,
            metadata,
        },
        WireEvent::Stage3Start => CouncilEvent::StageStarted(Stage::Three),
        WireEvent::Stage3Complete { data } => CouncilEvent::Stage3Complete(data),
        WireEvent::TitleComplete { data } => CouncilEvent::TitleComplete(data.title),
        WireEvent::Complete => CouncilEvent::Complete,
        WireEvent::Error { message } => {
            CouncilEvent::Error(message.unwrap_or_else(|| "council request failed".to_string()))
        }
        WireEvent::Unknown => return Ok(None),
    };

    Ok(Some(event))
}

impl Message {
    /// Folds one stage event into this assistant message.
    ///
    /// Lanes only move forward: a start event for a stage whose data already
    /// arrived is ignored. Conversation-level events (`TitleComplete`,
    /// `Complete`) leave the message untouched.
    pub fn apply_event(&mut self, event: &CouncilEvent) {
        match event {
            CouncilEvent::StageStarted(stage) => {
                if self.has_stage(*stage) {
                    tracing::debug!(stage = stage.number(), "ignoring start for completed stage");
                    return;
                }
                self.set_loading(*stage, true);
            }
            CouncilEvent::Stage1Complete(responses) => {
                self.stage1 = Some(responses.clone());
                self.set_loading(Stage::One, false);
            }
            CouncilEvent::Stage2Complete { rankings, metadata } => {
                self.stage2 = Some(rankings.clone());
                self.metadata = Some(metadata.clone());
                self.set_loading(Stage::Two, false);
            }
            CouncilEvent::Stage3Complete(result) => {
                self.stage3 = Some(result.clone());
                self.set_loading(Stage::Three, false);
            }
            CouncilEvent::Error(_) => {
                for stage in Stage::ALL {
                    self.set_loading(stage, false);
                }
            }
            CouncilEvent::TitleComplete(_) | CouncilEvent::Complete => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage_one() -> Vec<StageOneResponse> {
        vec![StageOneResponse {
            model: "openai/gpt-4o".to_string(),
            response: "Paris".to_string(),
        }]
    }

    #[test]
    fn parses_every_known_wire_event() {
        assert_eq!(
            parse_wire_event(r#"{"type":"stage1_start"}"#).unwrap(),
            Some(CouncilEvent::StageStarted(Stage::One))
        );
        assert_eq!(
            parse_wire_event(r#"{"type":"stage1_complete","data":[{"model":"openai/gpt-4o","response":"Paris"}]}"#)
                .unwrap(),
            Some(CouncilEvent::Stage1Complete(stage_one()))
        );
        assert_eq!(
            parse_wire_event(r#"{"type":"stage3_start"}"#).unwrap(),
            Some(CouncilEvent::StageStarted(Stage::Three))
        );
        assert_eq!(
            parse_wire_event(r#"{"type":"title_complete","data":{"title":"Capitals"}}"#).unwrap(),
            Some(CouncilEvent::TitleComplete("Capitals".to_string()))
        );
        assert_eq!(
            parse_wire_event(r#"{"type":"complete"}"#).unwrap(),
            Some(CouncilEvent::Complete)
        );
        assert_eq!(
            parse_wire_event(r#"{"type":"error","message":"boom"}"#).unwrap(),
            Some(CouncilEvent::Error("boom".to_string()))
        );
    }

    #[test]
    fn stage_two_complete_carries_metadata() {
        let event = parse_wire_event(
            r#"{"type":"stage2_complete",
                "data":[{"model":"x-ai/grok","ranking":"Response A is best","parsed_ranking":["Response A"]}],
                "metadata":{"label_to_model":{"Response A":"openai/gpt-4o"}}}"#,
        )
        .unwrap()
        .expect("known event");

        let CouncilEvent::Stage2Complete { rankings, metadata } = event else {
            panic!("expected stage 2 completion");
        };
        assert_eq!(rankings[0].parsed_ranking, vec!["Response A".to_string()]);
        assert!(metadata.aggregate_rankings.is_none());
        assert_eq!(
            metadata
                .label_to_model
                .and_then(|labels| labels.get("Response A").cloned()),
            Some("openai/gpt-4o".to_string())
        );
    }

    #[test]
    fn unknown_event_type_is_skipped_and_garbage_is_an_error() {
        assert_eq!(parse_wire_event(r#"{"type":"heartbeat"}"#).unwrap(), None);
        assert!(parse_wire_event("not json").is_err());
    }

    #[test]
    fn lane_moves_from_loading_to_complete() {
        let mut message = Message::assistant_pending();

        message.apply_event(&CouncilEvent::StageStarted(Stage::One));
        assert!(message.is_loading(Stage::One));
        assert!(!message.has_stage(Stage::One));

        message.apply_event(&CouncilEvent::Stage1Complete(stage_one()));
        assert!(!message.is_loading(Stage::One));
        assert!(message.has_stage(Stage::One));
    }

    #[test]
    fn start_after_completion_does_not_reopen_the_lane() {
        let mut message = Message::assistant_pending();
        message.apply_event(&CouncilEvent::Stage1Complete(stage_one()));

        message.apply_event(&CouncilEvent::StageStarted(Stage::One));

        assert!(!message.is_loading(Stage::One));
        assert_eq!(message.stage1, Some(stage_one()));
    }

    #[test]
    fn error_clears_every_loading_flag() {
        let mut message = Message::assistant_pending();
        message.apply_event(&CouncilEvent::StageStarted(Stage::One));
        message.apply_event(&CouncilEvent::StageStarted(Stage::Two));

        message.apply_event(&CouncilEvent::Error("upstream failed".to_string()));

        assert!(message.loading.is_some());
        assert!(Stage::ALL.into_iter().all(|stage| !message.is_loading(stage)));
    }
}

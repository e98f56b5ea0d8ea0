use crate::chat::message::{Message, Stage, StageOneResponse, StageThreeResult, StageTwoRanking};

/// Display state of one stage lane of an assistant message.
///
/// Loading flags and stage payloads arrive independently, so a lane can carry data while
/// its loading flag is still raised.
#[derive(Debug, PartialEq)]
pub enum LaneState<'a, T: ?Sized> {
    NotStarted,
    Loading,
    Complete(&'a T),
    LoadingWithData(&'a T),
}

impl<T: ?Sized> Clone for LaneState<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for LaneState<'_, T> {}

impl<'a, T: ?Sized> LaneState<'a, T> {
    pub fn from_parts(loading: bool, data: Option<&'a T>) -> Self {
        match (loading, data) {
            (false, None) => Self::NotStarted,
            (true, None) => Self::Loading,
            (false, Some(data)) => Self::Complete(data),
            (true, Some(data)) => Self::LoadingWithData(data),
        }
    }

    pub fn shows_indicator(&self) -> bool {
        matches!(self, Self::Loading | Self::LoadingWithData(_))
    }

    pub fn content(&self) -> Option<&'a T> {
        match *self {
            Self::Complete(data) | Self::LoadingWithData(data) => Some(data),
            Self::NotStarted | Self::Loading => None,
        }
    }
}

/// The three lanes of one assistant message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageLanes<'a> {
    pub stage1: LaneState<'a, [StageOneResponse]>,
    pub stage2: LaneState<'a, [StageTwoRanking]>,
    pub stage3: LaneState<'a, StageThreeResult>,
}

impl<'a> MessageLanes<'a> {
    pub fn of(message: &'a Message) -> Self {
        Self {
            stage1: LaneState::from_parts(
                message.is_loading(Stage::One),
                message.stage1.as_deref(),
            ),
            stage2: LaneState::from_parts(
                message.is_loading(Stage::Two),
                message.stage2.as_deref(),
            ),
            stage3: LaneState::from_parts(
                message.is_loading(Stage::Three),
                message.stage3.as_ref(),
            ),
        }
    }

    pub fn shows_indicator(&self, stage: Stage) -> bool {
        match stage {
            Stage::One => self.stage1.shows_indicator(),
            Stage::Two => self.stage2.shows_indicator(),
            Stage::Three => self.stage3.shows_indicator(),
        }
    }

    pub fn has_content(&self, stage: Stage) -> bool {
        match stage {
            Stage::One => self.stage1.content().is_some(),
            Stage::Two => self.stage2.content().is_some(),
            Stage::Three => self.stage3.content().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::LoadingFlags;
    use pretty_assertions::assert_eq;

    fn stage3() -> StageThreeResult {
        StageThreeResult {
            model: "google/gemini-3-pro".to_string(),
            response: "final".to_string(),
        }
    }

    #[test]
    fn every_flag_and_payload_combination_maps_to_one_state() {
        let result = stage3();

        assert_eq!(
            LaneState::<StageThreeResult>::from_parts(false, None),
            LaneState::NotStarted
        );
        assert_eq!(
            LaneState::<StageThreeResult>::from_parts(true, None),
            LaneState::Loading
        );
        assert_eq!(
            LaneState::from_parts(false, Some(&result)),
            LaneState::Complete(&result)
        );
        assert_eq!(
            LaneState::from_parts(true, Some(&result)),
            LaneState::LoadingWithData(&result)
        );
    }

    #[test]
    fn racy_state_shows_both_indicator_and_content() {
        let result = stage3();
        let lane = LaneState::from_parts(true, Some(&result));

        assert!(lane.shows_indicator());
        assert_eq!(lane.content(), Some(&result));
    }

    #[test]
    fn lanes_follow_loading_then_complete() {
        let mut message = Message::assistant_pending();
        assert_eq!(MessageLanes::of(&message).stage1, LaneState::NotStarted);

        message.loading = Some(LoadingFlags {
            stage1: true,
            ..LoadingFlags::default()
        });
        let lanes = MessageLanes::of(&message);
        assert!(lanes.shows_indicator(Stage::One));
        assert!(!lanes.has_content(Stage::One));

        message.stage1 = Some(vec![StageOneResponse {
            model: "openai/gpt-5".to_string(),
            response: "hello".to_string(),
        }]);
        message.loading = Some(LoadingFlags::default());
        let lanes = MessageLanes::of(&message);
        assert!(!lanes.shows_indicator(Stage::One));
        assert!(lanes.has_content(Stage::One));
        assert_eq!(lanes.stage2, LaneState::NotStarted);
    }

    #[test]
    fn lanes_are_independent() {
        let mut message = Message::assistant_pending();
        message.stage3 = Some(stage3());
        message.loading = Some(LoadingFlags {
            stage2: true,
            ..LoadingFlags::default()
        });

        let lanes = MessageLanes::of(&message);

        assert_eq!(lanes.stage1, LaneState::NotStarted);
        assert_eq!(lanes.stage2, LaneState::Loading);
        assert!(matches!(lanes.stage3, LaneState::Complete(_)));
    }
}

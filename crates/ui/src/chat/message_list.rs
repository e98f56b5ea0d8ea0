use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    text::TextView,
    v_flex,
};

use crate::chat::image_cache::{ImageCache, ImageKey};
use crate::chat::lanes::LaneState;
use crate::chat::message::{
    AggregateRanking, Conversation, Stage, StageOneResponse, StageThreeResult, StageTwoRanking,
};
use crate::chat::scroll_manager::ScrollManager;
use crate::chat::view_model::{
    ASSISTANT_LABEL, AssistantPlan, COUNCIL_LOADING_CAPTION, RowPlan, START_HINT, START_TITLE,
    ThreadPlan, USER_LABEL, ViewPlan, WELCOME_HINT, WELCOME_TITLE, aggregate_rows, deanonymize,
    plan, ranking_entry_name, short_model_name, stage_loading_caption, stage_title,
};

const MESSAGE_IMAGE_MAX_WIDTH: Pixels = px(240.);
const MESSAGE_IMAGE_MAX_HEIGHT: Pixels = px(240.);
const USER_BUBBLE_MAX_WIDTH: Pixels = px(560.);
const STAGE2_INTRO: &str = "Each model evaluated all responses (anonymized as Response A, B, C, etc.) and provided rankings. Below, model names are shown in **bold** for readability, but the original evaluation used anonymous labels.";
const AGGREGATE_INTRO: &str = "Combined results across all peer evaluations (lower score is better):";

/// Read-only rendering of a conversation snapshot.
pub struct MessageList {
    conversation: Option<Arc<Conversation>>,
    is_loading: bool,
    scroll_manager: ScrollManager,
    image_cache: ImageCache,
    /// Preview keys per message index, hashed once per snapshot.
    image_keys: Vec<Vec<ImageKey>>,
    /// Selected tab per (message index, stage).
    active_tabs: HashMap<(usize, Stage), usize>,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            conversation: None,
            is_loading: false,
            scroll_manager: ScrollManager::new(),
            image_cache: ImageCache::new(),
            image_keys: Vec::new(),
            active_tabs: HashMap::new(),
        }
    }

    pub fn set_state(
        &mut self,
        conversation: Option<Arc<Conversation>>,
        is_loading: bool,
        cx: &mut Context<Self>,
    ) {
        let same_thread = match (&self.conversation, &conversation) {
            (Some(previous), Some(next)) => previous.id == next.id,
            _ => false,
        };
        if !same_thread {
            self.active_tabs.clear();
        }

        if self.scroll_manager.observe(conversation.as_ref()) {
            self.image_keys = image_keys(conversation.as_deref());
            self.image_cache
                .retain(self.image_keys.iter().flatten().copied());
        }
        self.conversation = conversation;
        self.is_loading = is_loading;
        cx.notify();
    }

    fn select_tab(&mut self, message_index: usize, stage: Stage, tab: usize, cx: &mut Context<Self>) {
        self.active_tabs.insert((message_index, stage), tab);
        cx.notify();
    }

    fn active_tab(&self, message_index: usize, stage: Stage, len: usize) -> usize {
        clamp_tab(self.active_tabs.get(&(message_index, stage)).copied(), len)
    }

    fn render_welcome(&self, cx: &Context<Self>) -> AnyElement {
        render_empty_state(WELCOME_TITLE, WELCOME_HINT, cx).into_any_element()
    }

    fn render_thread(&mut self, thread: &ThreadPlan<'_>, cx: &mut Context<Self>) -> AnyElement {
        let rows = thread
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| match row {
                RowPlan::User { content, images } => self.render_user_row(index, content, images, cx),
                RowPlan::Assistant(assistant) => self.render_assistant_row(index, assistant, cx),
            })
            .collect::<Vec<_>>();

        let show_start_prompt = thread.show_start_prompt;
        let show_council_loading = thread.show_council_loading;

        div()
            .id("message-list")
            .size_full()
            .overflow_y_scroll()
            .track_scroll(self.scroll_manager.handle())
            .child(
                v_flex()
                    .w_full()
                    .px_4()
                    .py_3()
                    .gap_4()
                    .when(show_start_prompt, |column| {
                        column.child(render_empty_state(START_TITLE, START_HINT, cx))
                    })
                    .children(rows)
                    .when(show_council_loading, |column| {
                        column.child(render_progress(COUNCIL_LOADING_CAPTION, cx))
                    }),
            )
            .into_any_element()
    }

    fn render_user_row(
        &mut self,
        index: usize,
        content: &str,
        images: &[String],
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let keys = self.image_keys.get(index).map(Vec::as_slice).unwrap_or_default();
        let pictures = images
            .iter()
            .zip(keys)
            .filter_map(|(data, key)| self.image_cache.image_for(*key, data))
            .map(|image| {
                img(image)
                    .max_w(MESSAGE_IMAGE_MAX_WIDTH)
                    .max_h(MESSAGE_IMAGE_MAX_HEIGHT)
                    .rounded_md()
                    .object_fit(ObjectFit::Contain)
            })
            .collect::<Vec<_>>();

        v_flex()
            .w_full()
            .items_end()
            .gap_1()
            .child(
                Label::new(USER_LABEL)
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.5)),
            )
            .child(
                v_flex()
                    .max_w(USER_BUBBLE_MAX_WIDTH)
                    .px_3()
                    .py_2()
                    .gap_2()
                    .rounded_lg()
                    .bg(theme.accent)
                    .text_color(theme.accent_foreground)
                    .when(!pictures.is_empty(), |bubble| {
                        bubble.child(h_flex().flex_wrap().gap_2().children(pictures))
                    })
                    .when(!content.is_empty(), |bubble| {
                        bubble.child(render_markdown(format!("user-{index}"), content))
                    }),
            )
            .into_any_element()
    }

    fn render_assistant_row(
        &mut self,
        index: usize,
        assistant: &AssistantPlan<'_>,
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let lanes = assistant.lanes;
        let stage1 = self.render_stage1(index, lanes.stage1, cx);
        let stage2 = self.render_stage2(index, assistant, cx);
        let stage3 = render_stage3(index, lanes.stage3, cx);
        let theme = cx.theme();

        v_flex()
            .w_full()
            .gap_3()
            .child(
                Label::new(ASSISTANT_LABEL)
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.5)),
            )
            .children(stage1)
            .children(stage2)
            .children(stage3)
            .into_any_element()
    }

    fn render_stage1(
        &self,
        index: usize,
        lane: LaneState<'_, [StageOneResponse]>,
        cx: &Context<Self>,
    ) -> Vec<AnyElement> {
        let mut elements = Vec::new();
        if lane.shows_indicator() {
            elements.push(render_progress(stage_loading_caption(Stage::One), cx).into_any_element());
        }

        let Some(responses) = lane.content().filter(|responses| !responses.is_empty()) else {
            return elements;
        };

        let active = self.active_tab(index, Stage::One, responses.len());
        let tabs = self.render_tabs(
            index,
            Stage::One,
            responses.iter().map(|response| response.model.as_str()),
            active,
            cx,
        );
        let selected = &responses[active];

        elements.push(
            render_stage_panel(Stage::One, cx)
                .child(tabs)
                .child(render_model_caption(&selected.model, cx))
                .child(render_markdown(
                    format!("stage1-{index}-{active}"),
                    &selected.response,
                ))
                .into_any_element(),
        );
        elements
    }

    fn render_stage2(
        &self,
        index: usize,
        assistant: &AssistantPlan<'_>,
        cx: &Context<Self>,
    ) -> Vec<AnyElement> {
        let lane = assistant.lanes.stage2;
        let mut elements = Vec::new();
        if lane.shows_indicator() {
            elements.push(render_progress(stage_loading_caption(Stage::Two), cx).into_any_element());
        }

        let Some(rankings) = lane.content().filter(|rankings| !rankings.is_empty()) else {
            return elements;
        };

        let active = self.active_tab(index, Stage::Two, rankings.len());
        let tabs = self.render_tabs(
            index,
            Stage::Two,
            rankings.iter().map(|ranking| ranking.model.as_str()),
            active,
            cx,
        );
        let selected = &rankings[active];

        elements.push(
            render_stage_panel(Stage::Two, cx)
                .child(render_section_heading("Raw Evaluations", cx))
                .child(render_markdown(format!("stage2-intro-{index}"), STAGE2_INTRO))
                .child(tabs)
                .child(render_model_caption(&selected.model, cx))
                .child(render_markdown(
                    format!("stage2-{index}-{active}"),
                    &deanonymize(&selected.ranking, assistant.label_to_model),
                ))
                .children(render_parsed_ranking(selected, assistant.label_to_model, cx))
                .children(
                    assistant
                        .aggregate_rankings
                        .filter(|rankings| !rankings.is_empty())
                        .map(|rankings| render_aggregate(rankings, cx)),
                )
                .into_any_element(),
        );
        elements
    }

    fn render_tabs<'a>(
        &self,
        index: usize,
        stage: Stage,
        models: impl Iterator<Item = &'a str>,
        active: usize,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let buttons = models
            .enumerate()
            .map(|(tab, model)| {
                let id = SharedString::from(format!("stage{}-tab-{index}-{tab}", stage.number()));
                Button::new(id)
                    .small()
                    .map(|button| if tab == active { button.primary() } else { button.ghost() })
                    .child(short_model_name(model).to_string())
                    .on_click(cx.listener(move |this, _, _window, cx| {
                        this.select_tab(index, stage, tab, cx);
                    }))
            })
            .collect::<Vec<_>>();

        h_flex().w_full().flex_wrap().gap_1().children(buttons)
    }
}

impl Render for MessageList {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if self.scroll_manager.apply_pending_scroll() {
            window.request_animation_frame();
        }

        let conversation = self.conversation.clone();
        let content = match plan(conversation.as_deref(), self.is_loading) {
            ViewPlan::Welcome => self.render_welcome(cx),
            ViewPlan::Thread(thread) => self.render_thread(&thread, cx),
        };

        v_flex().size_full().min_h_0().child(content)
    }
}

fn clamp_tab(selected: Option<usize>, len: usize) -> usize {
    selected.unwrap_or(0).min(len.saturating_sub(1))
}

fn render_markdown(id: String, content: &str) -> AnyElement {
    TextView::markdown(ElementId::Name(SharedString::from(id)), content.to_string())
        .selectable(true)
        .into_any_element()
}

fn render_empty_state<T: 'static>(title: &'static str, hint: &'static str, cx: &Context<T>) -> Div {
    let theme = cx.theme();

    v_flex()
        .size_full()
        .py_8()
        .gap_2()
        .items_center()
        .justify_center()
        .child(Label::new(title).text_lg())
        .child(
            Label::new(hint)
                .text_sm()
                .text_color(theme.muted_foreground),
        )
}

fn render_progress<T: 'static>(caption: &'static str, cx: &Context<T>) -> Div {
    let theme = cx.theme();

    h_flex()
        .w_full()
        .gap_2()
        .items_center()
        .child(div().size(px(8.)).rounded_full().bg(theme.primary))
        .child(
            Label::new(caption)
                .text_xs()
                .text_color(theme.foreground.opacity(0.65)),
        )
}

fn render_stage_panel<T: 'static>(stage: Stage, cx: &Context<T>) -> Div {
    let theme = cx.theme();

    v_flex()
        .w_full()
        .gap_2()
        .p_3()
        .rounded_lg()
        .border_1()
        .border_color(theme.border)
        .bg(theme.background)
        .child(Label::new(stage_title(stage)).text_sm())
}

fn render_section_heading<T: 'static>(heading: &'static str, cx: &Context<T>) -> Label {
    Label::new(heading)
        .text_xs()
        .text_color(cx.theme().foreground.opacity(0.8))
}

fn render_model_caption<T: 'static>(model: &str, cx: &Context<T>) -> Label {
    Label::new(model.to_string())
        .text_xs()
        .text_color(cx.theme().muted_foreground)
}

fn render_parsed_ranking<T: 'static>(
    ranking: &StageTwoRanking,
    label_to_model: Option<&BTreeMap<String, String>>,
    cx: &Context<T>,
) -> Option<Div> {
    if ranking.parsed_ranking.is_empty() {
        return None;
    }

    let entries = ranking
        .parsed_ranking
        .iter()
        .enumerate()
        .map(|(position, label)| {
            Label::new(format!(
                "{}. {}",
                position + 1,
                ranking_entry_name(label, label_to_model)
            ))
            .text_sm()
        })
        .collect::<Vec<_>>();

    Some(
        v_flex()
            .gap_1()
            .child(render_section_heading("Extracted Ranking:", cx))
            .children(entries),
    )
}

fn render_aggregate<T: 'static>(rankings: &[AggregateRanking], cx: &Context<T>) -> Div {
    let theme = cx.theme();
    let rows = aggregate_rows(rankings)
        .into_iter()
        .map(|row| {
            h_flex()
                .w_full()
                .gap_3()
                .items_center()
                .child(Label::new(format!("#{}", row.position)).text_sm())
                .child(div().flex_1().child(Label::new(row.model).text_sm()))
                .child(Label::new(row.average).text_xs())
                .child(
                    Label::new(row.votes)
                        .text_xs()
                        .text_color(theme.muted_foreground),
                )
        })
        .collect::<Vec<_>>();

    v_flex()
        .w_full()
        .gap_1()
        .pt_2()
        .border_t_1()
        .border_color(theme.border)
        .child(render_section_heading("Aggregate Rankings (Street Cred)", cx))
        .child(
            Label::new(AGGREGATE_INTRO)
                .text_xs()
                .text_color(theme.muted_foreground),
        )
        .children(rows)
}

fn render_stage3<T: 'static>(
    index: usize,
    lane: LaneState<'_, StageThreeResult>,
    cx: &Context<T>,
) -> Vec<AnyElement> {
    let mut elements = Vec::new();
    if lane.shows_indicator() {
        elements.push(render_progress(stage_loading_caption(Stage::Three), cx).into_any_element());
    }

    if let Some(result) = lane.content() {
        elements.push(
            render_stage_panel(Stage::Three, cx)
                .child(render_model_caption(
                    &format!("Chairman: {}", short_model_name(&result.model)),
                    cx,
                ))
                .child(render_markdown(format!("stage3-{index}"), &result.response))
                .into_any_element(),
        );
    }

    elements
}

fn image_keys(conversation: Option<&Conversation>) -> Vec<Vec<ImageKey>> {
    conversation
        .map(|conversation| {
            conversation
                .messages
                .iter()
                .map(|message| {
                    message
                        .images
                        .iter()
                        .flatten()
                        .map(|data| ImageKey::of(data))
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default()
}

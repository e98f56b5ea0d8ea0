use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Icon, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

use crate::chat::ingest::{IngestSource, drop_candidates, picker_candidates};
use crate::chat::message_input::MessageInput;

const PREVIEW_SIZE: Pixels = px(72.);
pub const UPLOAD_HINT: &str = "Click or drag images here";

impl MessageInput {
    /// Opens the native file dialog and ingests whatever images come back.
    pub fn open_file_picker(&mut self, cx: &mut Context<Self>) {
        let selection = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: true,
            prompt: None,
        });

        cx.spawn(async move |this, cx| {
            let paths = match selection.await {
                Ok(Ok(Some(paths))) => paths,
                Ok(Ok(None)) | Err(_) => return,
                Ok(Err(error)) => {
                    tracing::warn!(error = %error, "file picker failed");
                    return;
                }
            };

            let _ = this.update(cx, |this, cx| {
                this.ingest(IngestSource::FilePicker, picker_candidates(&paths), cx);
            });
        })
        .detach();
    }

    fn ingest_dropped(&mut self, paths: &ExternalPaths, cx: &mut Context<Self>) {
        let candidates = drop_candidates(paths.paths());
        if candidates.len() < paths.paths().len() {
            tracing::debug!(
                dropped = paths.paths().len(),
                images = candidates.len(),
                "ignoring non-image files in drop"
            );
        }
        self.ingest(IngestSource::Drop, candidates, cx);
    }

    pub(super) fn render_image_upload(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        let previews = self
            .composer
            .attachments()
            .iter()
            .enumerate()
            .map(|(index, attachment)| {
                let thumbnail = match self.image_cache.image_for(attachment.key, &attachment.data) {
                    Some(image) => img(image)
                        .size_full()
                        .object_fit(ObjectFit::Cover)
                        .into_any_element(),
                    None => div()
                        .size_full()
                        .p_1()
                        .child(Label::new(attachment.name.clone()).text_xs())
                        .into_any_element(),
                };

                div()
                    .id(("attachment-preview", index))
                    .relative()
                    .flex_shrink_0()
                    .size(PREVIEW_SIZE)
                    .rounded_md()
                    .overflow_hidden()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .child(thumbnail)
                    .child(
                        div().absolute().top_0().right_0().child(
                            Button::new(("remove-attachment", index))
                                .ghost()
                                .xsmall()
                                .icon(IconName::Close)
                                .on_click(cx.listener(move |this, _, _window, cx| {
                                    this.remove_attachment(index, cx);
                                })),
                        ),
                    )
            })
            .collect::<Vec<_>>();

        v_flex()
            .id("image-upload")
            .w_full()
            .gap_2()
            .when(!previews.is_empty(), |column| {
                column.child(h_flex().w_full().flex_wrap().gap_2().children(previews))
            })
            .child(
                h_flex()
                    .id("image-upload-area")
                    .w_full()
                    .px_3()
                    .py_2()
                    .gap_2()
                    .items_center()
                    .justify_center()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .text_color(theme.muted_foreground)
                    .cursor_pointer()
                    .hover(|area| area.bg(theme.muted))
                    .drag_over::<ExternalPaths>(|area, _, _window, cx| {
                        area.bg(cx.theme().muted).border_color(cx.theme().primary)
                    })
                    .on_drop(cx.listener(|this, paths: &ExternalPaths, _window, cx| {
                        this.ingest_dropped(paths, cx);
                    }))
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.open_file_picker(cx);
                    }))
                    .child(Icon::new(IconName::Plus).size(px(16.)))
                    .child(Label::new(UPLOAD_HINT).text_sm()),
            )
    }
}

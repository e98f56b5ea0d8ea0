use std::path::PathBuf;
use std::sync::Arc;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::notification::{Notification, NotificationList};
use gpui_component::{
    ActiveTheme, IconName, Sizable, ThemeMode,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

use crate::chat::{ChatView, CouncilFailed, TitleChanged};
use crate::settings::{CouncilSettings, SettingsStore};

/// Returns the default themes directory path.
pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

pub const APP_TITLE: &str = "LLM Council";

#[cfg(target_os = "macos")]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 16.0;
#[cfg(target_os = "windows")]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 120.0;
#[cfg(not(target_os = "windows"))]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 16.0;

/// Computes the top toolbar height using a Zed-style responsive formula.
///
/// This keeps the title area consistent across macOS and Linux while still
/// respecting user font scaling via rem size.
fn window_toolbar_height(window: &Window) -> Pixels {
    (1.75 * window.rem_size()).max(px(34.0))
}

/// Text shown in the title bar for the current conversation.
pub fn display_title(title: Option<&str>) -> &str {
    match title.map(str::trim) {
        Some(title) if !title.is_empty() => title,
        _ => APP_TITLE,
    }
}

gpui::actions!(shell, [NewConversation, ToggleTheme, Quit,]);

/// Main application shell.
///
/// Hosts the title bar, the chat view, and the notification layer that surfaces
/// council failures.
pub struct ChatAppShell {
    notification_list: Entity<NotificationList>,
    chat_view: Entity<ChatView>,
    settings_store: Arc<SettingsStore>,
    title: Option<SharedString>,
    title_bar_should_move: bool,
    _subscriptions: Vec<Subscription>,
}

impl ChatAppShell {
    pub fn new(
        notification_list: Entity<NotificationList>,
        settings_store: Arc<SettingsStore>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let backend = council_backend::create_backend(settings_store.settings().backend_config());
        let chat_view = cx.new(|cx| ChatView::new(backend, window, cx));

        let subscriptions = vec![
            cx.subscribe_in(
                &chat_view,
                window,
                |this, _, event: &CouncilFailed, window, cx| {
                    this.notify_failure(event.message.clone(), window, cx);
                },
            ),
            cx.subscribe_in(
                &chat_view,
                window,
                |this, _, event: &TitleChanged, _window, cx| {
                    this.title = Some(event.title.clone().into());
                    cx.notify();
                },
            ),
        ];

        Self {
            notification_list,
            chat_view,
            settings_store,
            title: None,
            title_bar_should_move: false,
            _subscriptions: subscriptions,
        }
    }

    pub fn new_conversation(&mut self, cx: &mut Context<Self>) {
        self.chat_view
            .update(cx, |chat_view, cx| chat_view.create_conversation(cx));
    }

    pub fn toggle_theme(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let mode = if self.settings_store.settings().theme_mode.is_dark() {
            ThemeMode::Light
        } else {
            ThemeMode::Dark
        };

        let settings = match self
            .settings_store
            .update(|settings| settings.set_theme_mode(mode))
        {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(error = %error, "failed to persist theme preference");
                self.notify_failure(format!("Failed to save settings: {error}"), window, cx);
                let mut settings = CouncilSettings::clone(&self.settings_store.settings());
                settings.set_theme_mode(mode);
                Arc::new(settings)
            }
        };
        settings.apply_theme(Some(window), cx);
        cx.notify();
    }

    fn notify_failure(&mut self, message: String, window: &mut Window, cx: &mut Context<Self>) {
        self.notification_list.update(cx, |list, cx| {
            list.push(Notification::error(message), window, cx);
        });
    }
}

impl Render for ChatAppShell {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let toolbar_height = window_toolbar_height(window);

        div()
            .size_full()
            .relative()
            .bg(theme.background)
            .on_action(cx.listener(|this, _: &NewConversation, _window, cx| {
                this.new_conversation(cx);
            }))
            .on_action(cx.listener(|this, _: &ToggleTheme, window, cx| {
                this.toggle_theme(window, cx);
            }))
            .child(
                v_flex().size_full().child(
                    v_flex()
                        .id("main-content")
                        .flex_1()
                        .min_w_0()
                        .min_h_0()
                        .pt(toolbar_height)
                        .overflow_hidden()
                        .child(self.chat_view.clone()),
                ),
            )
            .child(
                div()
                    .absolute()
                    .top_0()
                    .left_0()
                    .right_0()
                    .child(self.render_top_bar(window, toolbar_height, cx)),
            )
            .child(self.notification_list.clone())
    }
}

impl ChatAppShell {
    fn render_top_bar(
        &self,
        window: &Window,
        toolbar_height: Pixels,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();
        let title = display_title(self.title.as_deref()).to_string();
        let theme_icon = if theme.mode.is_dark() {
            IconName::Sun
        } else {
            IconName::Moon
        };

        h_flex()
            .id("app-top-bar")
            .window_control_area(WindowControlArea::Drag)
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.title_bar_should_move = false;
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = false;
                }),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = true;
                }),
            )
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.title_bar_should_move {
                    this.title_bar_should_move = false;
                    window.start_window_move();
                }
            }))
            .w_full()
            .h(toolbar_height)
            .flex_shrink_0()
            .pl(px(WINDOW_TOOLBAR_LEFT_SAFE_PADDING))
            .pr(px(WINDOW_TOOLBAR_RIGHT_SAFE_PADDING))
            .gap_2()
            .items_center()
            .justify_between()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(
                div()
                    .id("app-title")
                    .flex_1()
                    .min_w_0()
                    .overflow_hidden()
                    .child(Label::new(title).text_sm()),
            )
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        Button::new("new-conversation")
                            .ghost()
                            .small()
                            .icon(IconName::Plus)
                            .label("New Conversation")
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.new_conversation(cx);
                            })),
                    )
                    .child(
                        Button::new("toggle-theme")
                            .ghost()
                            .small()
                            .icon(theme_icon)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.toggle_theme(window, cx);
                            })),
                    ),
            )
            .when(
                cfg!(target_os = "linux") && window.window_controls().window_menu,
                |title_bar| {
                    title_bar.on_mouse_down(MouseButton::Right, |event, window, _| {
                        window.show_window_menu(event.position);
                    })
                },
            )
            .child(self.render_linux_window_controls(window, cx))
    }

    fn render_linux_window_controls(&self, window: &Window, cx: &Context<Self>) -> AnyElement {
        #[cfg(target_os = "linux")]
        {
            let maximize_icon = if window.is_maximized() {
                IconName::WindowRestore
            } else {
                IconName::WindowMaximize
            };

            h_flex()
                .id("linux-window-controls")
                .items_center()
                // Keep control clicks out of title bar gestures such as double-click maximize.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .on_mouse_down(MouseButton::Right, |_, _, cx| cx.stop_propagation())
                .gap_2()
                .ml_2()
                .child(
                    Button::new("linux-window-minimize")
                        .ghost()
                        .small()
                        .icon(IconName::WindowMinimize)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.minimize_window();
                        })),
                )
                .child(
                    Button::new("linux-window-maximize")
                        .ghost()
                        .small()
                        .icon(maximize_icon)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.zoom_window();
                        })),
                )
                .child(
                    Button::new("linux-window-close")
                        .ghost()
                        .small()
                        .icon(IconName::WindowClose)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.remove_window();
                        })),
                )
                .into_any_element()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (window, cx);
            div().into_any_element()
        }
    }
}

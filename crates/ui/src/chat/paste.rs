use gpui::{App, ClipboardEntry, Keystroke, Subscription, WeakEntity};

use crate::chat::ingest::{IngestSource, PastePlan, PastedItem, plan_paste, unix_millis};
use crate::chat::message_input::MessageInput;

/// Window-wide image paste handling, alive only while the guard is held.
///
/// Dropping the guard drops the keystroke interceptor, so a hidden composer never
/// swallows pastes meant for other inputs.
pub struct PasteListener {
    _subscription: Subscription,
}

impl PasteListener {
    pub fn acquire(input: WeakEntity<MessageInput>, cx: &mut App) -> Self {
        let subscription = cx.intercept_keystrokes(move |event, _window, cx| {
            if !is_paste_keystroke(&event.keystroke) {
                return;
            }

            let items = cx
                .read_from_clipboard()
                .map(|item| pasted_items(item.entries()))
                .unwrap_or_default();

            let plan = plan_paste(items, unix_millis());
            if !plan.suppresses_default() {
                return;
            }

            // Images on the clipboard: keep the text input from pasting anything.
            cx.stop_propagation();
            let PastePlan::Ingest(candidates) = plan else {
                return;
            };

            let result = input.update(cx, |input, cx| {
                input.ingest(IngestSource::Paste, candidates, cx);
            });
            if result.is_err() {
                tracing::debug!("composer dropped before paste could be ingested");
            }
        });

        tracing::debug!("paste listener attached");
        Self {
            _subscription: subscription,
        }
    }
}

impl Drop for PasteListener {
    fn drop(&mut self) {
        tracing::debug!("paste listener released");
    }
}

/// Secondary+V everywhere, plus the Shift+Insert chord used on Linux and Windows.
fn is_paste_keystroke(keystroke: &Keystroke) -> bool {
    let modifiers = &keystroke.modifiers;
    let secondary_v =
        modifiers.secondary() && !modifiers.shift && !modifiers.alt && keystroke.key == "v";
    let shift_insert = modifiers.shift
        && !modifiers.control
        && !modifiers.alt
        && !modifiers.platform
        && keystroke.key == "insert";
    secondary_v || shift_insert
}

fn pasted_items(entries: &[ClipboardEntry]) -> Vec<PastedItem> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            ClipboardEntry::String(_) => Some(PastedItem::text()),
            ClipboardEntry::Image(image) => Some(PastedItem::image(
                image.format.mime_type(),
                image.bytes.clone(),
            )),
            #[allow(unreachable_patterns)]
            _ => None,
        })
        .collect()
}

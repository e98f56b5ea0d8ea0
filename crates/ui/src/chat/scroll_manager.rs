use std::sync::Arc;

use gpui::{Pixels, ScrollHandle, point};

use crate::chat::message::Conversation;

/// Frames a bottom scroll is re-applied for, so late layout growth is still followed.
const SETTLE_FRAMES: u8 = 3;

/// Scrolls the conversation to its tail whenever a new conversation snapshot is observed.
pub struct ScrollManager {
    scroll_handle: ScrollHandle,
    last_snapshot: Option<Arc<Conversation>>,
    pending_frames: u8,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: ScrollHandle::new(),
            last_snapshot: None,
            pending_frames: 0,
        }
    }

    pub fn handle(&self) -> &ScrollHandle {
        &self.scroll_handle
    }

    /// Records the snapshot being shown. Returns whether its identity changed.
    ///
    /// Snapshots are copy-on-write, so any content change arrives as a new `Arc`.
    pub fn observe(&mut self, snapshot: Option<&Arc<Conversation>>) -> bool {
        let changed = match (&self.last_snapshot, snapshot) {
            (Some(previous), Some(next)) => !Arc::ptr_eq(previous, next),
            (None, None) => false,
            _ => true,
        };

        if changed {
            self.last_snapshot = snapshot.cloned();
            self.pending_frames = if snapshot.is_some() { SETTLE_FRAMES } else { 0 };
        }

        changed
    }

    pub fn has_pending_scroll(&self) -> bool {
        self.pending_frames > 0
    }

    /// Moves to the bottom if a scroll is pending. Returns whether another frame is needed.
    pub fn apply_pending_scroll(&mut self) -> bool {
        if self.pending_frames == 0 {
            return false;
        }

        let max_offset = self.scroll_handle.max_offset().height;
        let current_x = self.scroll_handle.offset().x;
        // GPUI scrolls down with negative Y offsets.
        let target_y = if max_offset > Pixels::ZERO {
            -max_offset
        } else {
            Pixels::ZERO
        };
        self.scroll_handle.set_offset(point(current_x, target_y));

        self.pending_frames -= 1;
        self.pending_frames > 0
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

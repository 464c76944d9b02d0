//! Focus management.

use crate::core::window::record::WindowId;

const HISTORY_LIMIT: usize = 10;

/// Keyboard focus, pointer focus and the implicit pointer grab.
#[derive(Debug, Default)]
pub struct FocusManager {
    keyboard_focus: Option<WindowId>,
    pointer_focus: Option<WindowId>,
    /// Previously focused windows, most recent first
    focus_history: Vec<WindowId>,
    /// Window that received the press starting the current implicit grab
    grab: Option<WindowId>,
}

impl FocusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set keyboard focus. Returns true if focus actually moved.
    pub fn set_keyboard_focus(&mut self, id: Option<WindowId>) -> bool {
        if self.keyboard_focus == id {
            return false;
        }
        if let Some(prev) = self.keyboard_focus {
            self.focus_history.retain(|&w| w != prev);
            self.focus_history.insert(0, prev);
            self.focus_history.truncate(HISTORY_LIMIT);
        }
        if let Some(id) = id {
            self.focus_history.retain(|&w| w != id);
        }
        self.keyboard_focus = id;
        true
    }

    pub fn keyboard_focus(&self) -> Option<WindowId> {
        self.keyboard_focus
    }

    pub fn set_pointer_focus(&mut self, id: Option<WindowId>) {
        self.pointer_focus = id;
    }

    pub fn pointer_focus(&self) -> Option<WindowId> {
        self.pointer_focus
    }

    pub fn has_keyboard_focus(&self, id: WindowId) -> bool {
        self.keyboard_focus == Some(id)
    }

    pub fn history(&self) -> &[WindowId] {
        &self.focus_history
    }

    pub fn begin_grab(&mut self, id: WindowId) {
        self.grab = Some(id);
    }

    pub fn end_grab(&mut self) -> Option<WindowId> {
        self.grab.take()
    }

    pub fn grab(&self) -> Option<WindowId> {
        self.grab
    }

    /// Forget a destroyed window. If it held keyboard focus, focus falls
    /// back to the most recent surviving window in the history, which is
    /// returned.
    pub fn forget(&mut self, id: WindowId, alive: impl Fn(WindowId) -> bool) -> Option<WindowId> {
        self.focus_history.retain(|&w| w != id);
        if self.pointer_focus == Some(id) {
            self.pointer_focus = None;
        }
        if self.grab == Some(id) {
            self.grab = None;
        }
        if self.keyboard_focus != Some(id) {
            return self.keyboard_focus;
        }
        self.focus_history.retain(|&w| alive(w));
        let next = if self.focus_history.is_empty() {
            None
        } else {
            Some(self.focus_history.remove(0))
        };
        self.keyboard_focus = next;
        next
    }
}

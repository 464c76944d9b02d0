//! Window stacking order.

use crate::core::window::record::WindowId;

/// Stacking order of live windows.
#[derive(Debug, Default)]
pub struct WindowTree {
    /// Back to front; the last element is the topmost window.
    stacking_order: Vec<WindowId>,
}

impl WindowTree {
    pub fn new() -> Self {
        Self {
            stacking_order: Vec::new(),
        }
    }

    /// Insert a new window at the top of the stack.
    pub fn insert(&mut self, id: WindowId) {
        if !self.stacking_order.contains(&id) {
            self.stacking_order.push(id);
        }
    }

    pub fn remove(&mut self, id: WindowId) {
        if let Some(pos) = self.position(id) {
            self.stacking_order.remove(pos);
        }
    }

    /// Move a window to the front. Returns false if it is not stacked.
    pub fn bring_to_front(&mut self, id: WindowId) -> bool {
        match self.position(id) {
            Some(pos) => {
                let id = self.stacking_order.remove(pos);
                self.stacking_order.push(id);
                true
            }
            None => false,
        }
    }

    pub fn topmost(&self) -> Option<WindowId> {
        self.stacking_order.last().copied()
    }

    pub fn len(&self) -> usize {
        self.stacking_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacking_order.is_empty()
    }

    /// Back to front.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = WindowId> + '_ {
        self.stacking_order.iter().copied()
    }

    /// Front to back.
    pub fn front_to_back(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.stacking_order.iter().rev().copied()
    }

    fn position(&self, id: WindowId) -> Option<usize> {
        self.stacking_order.iter().position(|&w| w == id)
    }
}

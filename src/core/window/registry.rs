//! Window registry.
//!
//! Arena of window records indexed by identity. Everything outside the
//! registry holds a [`WindowHandle`] and resolves it through [`WindowRegistry::lookup`].

use std::cmp::Reverse;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::config::ServerConfig;
use crate::core::surface::buffer_cap;
use crate::core::window::record::{WindowId, WindowIdAllocator, WindowRecord, WindowState};
use crate::core::window::style::StyleMask;
use crate::core::window::tree::WindowTree;
use crate::prelude::*;
use crate::util::logging::REGISTRY;

/// Client-held reference to a registered window.
pub type WindowHandle = WindowId;

#[derive(Debug)]
pub struct WindowRegistry {
    ids: WindowIdAllocator,
    windows: HashMap<WindowId, WindowRecord>,
    tree: WindowTree,
    screen: Rect,
    safety_margin: u32,
}

impl WindowRegistry {
    pub fn new(screen: Rect, safety_margin: u32) -> Self {
        Self {
            ids: WindowIdAllocator::new(),
            windows: HashMap::new(),
            tree: WindowTree::new(),
            screen,
            safety_margin,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.screen.rect(), config.buffers.safety_margin)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn screen(&self) -> Rect {
        self.screen
    }

    /// Screen geometry changed; affects the buffer cap of later attaches.
    pub fn set_screen(&mut self, screen: Rect) {
        tracing::info!(target: REGISTRY, "Screen geometry now {:?}", screen);
        self.screen = screen;
    }

    /// Largest buffer a window may attach on the current screen.
    pub fn buffer_cap(&self) -> usize {
        buffer_cap(self.screen.width, self.screen.height, self.safety_margin)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Build a record with an identity from this registry's allocator.
    pub fn new_record(&mut self, geometry: Rect, style: StyleMask, title: &str) -> Result<WindowRecord, WindowError> {
        WindowRecord::create(&mut self.ids, geometry, style, title)
    }

    pub fn create_window(&mut self, geometry: Rect, style: StyleMask, title: &str) -> Result<WindowHandle, WindowError> {
        let record = self.new_record(geometry, style, title)?;
        self.register(record)
    }

    /// Take ownership of a record and stack it on top.
    pub fn register(&mut self, record: WindowRecord) -> Result<WindowHandle, WindowError> {
        let id = record.id();
        if record.is_destroyed() {
            return Err(WindowError::UseAfterDestroy(id));
        }
        if self.windows.contains_key(&id) {
            return Err(WindowError::DuplicateIdentity(id));
        }
        self.windows.insert(id, record);
        self.tree.insert(id);
        tracing::debug!(target: REGISTRY, "Registered window {} ({} total)", id, self.windows.len());
        Ok(id)
    }

    pub fn lookup(&self, handle: WindowHandle) -> Option<&WindowRecord> {
        self.windows.get(&handle)
    }

    pub fn lookup_mut(&mut self, handle: WindowHandle) -> Option<&mut WindowRecord> {
        self.windows.get_mut(&handle)
    }

    /// Destroy the record and drop it from the registry.
    pub fn unregister(&mut self, handle: WindowHandle) -> Result<(), WindowError> {
        let record = self.get_mut(handle)?;
        let destroyed = record.destroy();
        self.windows.remove(&handle);
        self.tree.remove(handle);
        tracing::debug!(target: REGISTRY, "Unregistered window {}", handle);
        destroyed
    }

    fn get_mut(&mut self, handle: WindowHandle) -> Result<&mut WindowRecord, WindowError> {
        self.windows
            .get_mut(&handle)
            .ok_or(WindowError::UnknownWindow(handle))
    }

    // =========================================================================
    // Lifecycle passthroughs
    // =========================================================================

    pub fn attach_buffer(&mut self, handle: WindowHandle, path: &Path, size: usize) -> Result<()> {
        let cap = self.buffer_cap();
        self.get_mut(handle)?.attach_buffer(path, size, cap)
    }

    pub fn mark_ready(&mut self, handle: WindowHandle) -> Result<u64, WindowError> {
        self.get_mut(handle)?.mark_ready()
    }

    pub fn hide(&mut self, handle: WindowHandle) -> Result<(), WindowError> {
        self.get_mut(handle)?.hide()
    }

    /// Move a window to the front of its level.
    pub fn raise(&mut self, handle: WindowHandle) -> bool {
        self.tree.bring_to_front(handle)
    }

    // =========================================================================
    // Compositor view
    // =========================================================================

    /// Live windows front to back. Higher levels come first; within a level
    /// the stacking order decides.
    fn stacked(&self) -> Vec<&WindowRecord> {
        let mut stacked: Vec<&WindowRecord> = self
            .tree
            .front_to_back()
            .filter_map(|id| self.windows.get(&id))
            .collect();
        stacked.sort_by_key(|r| Reverse(r.level()));
        stacked
    }

    /// Windows the compositor may read this frame, front to back. Only
    /// `Ready` and `Hidden` records appear, so a buffer is never read before
    /// its client published a complete frame.
    pub fn frame_snapshot(&self) -> Vec<&WindowRecord> {
        self.stacked()
            .into_iter()
            .filter(|r| r.is_presentable() && !r.is_excluded_from_snapshot())
            .collect()
    }

    /// Whether the frame `seq` taken in a snapshot is still the window's
    /// current frame, so the client may be told it was consumed.
    pub fn frame_presented(&self, handle: WindowHandle, seq: u64) -> bool {
        self.lookup(handle)
            .map(|r| r.is_presentable() && seq != 0 && r.frame_seq() == seq)
            .unwrap_or(false)
    }

    /// Topmost visible window whose frame contains `p`.
    pub fn window_under(&self, p: Point) -> Option<WindowHandle> {
        self.stacked()
            .into_iter()
            .find(|r| r.state() == WindowState::Ready && r.frame().contains(p))
            .map(|r| r.id())
    }

    /// `screen` minus every reserved zone claimed by a live window.
    pub fn usable_area(&self, screen: Rect) -> Rect {
        let reserved = self
            .windows
            .values()
            .filter(|r| !r.is_destroyed())
            .fold(Insets::ZERO, |acc, r| acc.max(r.reserved_zone()));
        screen.inset(reserved)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Destroy every window whose owning process has exited.
    pub fn reap_dead_clients(&mut self) -> Vec<WindowHandle> {
        let mut dead: Vec<WindowHandle> = self
            .windows
            .values()
            .filter(|r| r.owner().is_some_and(|pid| !process_alive(pid)))
            .map(|r| r.id())
            .collect();
        dead.sort();

        for &id in &dead {
            tracing::info!(target: REGISTRY, "Owner of window {} is gone, destroying", id);
            if let Err(e) = self.unregister(id) {
                tracing::warn!(target: REGISTRY, "Reaping window {} failed: {}", id, e);
            }
        }
        dead
    }

    /// Destroy all windows. Returns how many were torn down.
    pub fn shutdown(&mut self) -> usize {
        let ids: Vec<WindowId> = self.tree.iter().collect();
        let count = ids.len();
        for id in ids {
            if let Err(e) = self.unregister(id) {
                tracing::warn!(target: REGISTRY, "Destroying window {} at shutdown failed: {}", id, e);
            }
        }
        self.windows.clear();
        count
    }
}

/// `kill(pid, 0)` check: only `ESRCH` means the process is gone.
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

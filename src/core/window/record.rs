//! The authoritative per-window entity.
//!
//! Lifecycle: `Created -> BufferAttached -> Ready <-> Hidden`, with
//! `Destroyed` reachable from every state and terminal. Only `Ready` and
//! `Hidden` windows may have their buffer read by the compositor.

use std::fmt;
use std::path::Path;

use crate::core::errors::{ServerError, WindowError};
use crate::core::surface::PresentationBuffer;
use crate::core::window::style::{self, ButtonRects, FrameRegion, StyleMask};
use crate::core::window::title::{WindowIcon, WindowTitle};
use crate::util::geometry::{Insets, Point, Rect};
use crate::util::logging::WINDOW;

/// Window identity, unique for the life of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl WindowId {
    /// Rebuild an identity received from a client handle.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out identities in increasing order and never reuses one, so a
/// stale client handle can never alias a newer window.
#[derive(Debug)]
pub struct WindowIdAllocator {
    next: u32,
}

impl Default for WindowIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> Result<WindowId, WindowError> {
        let id = self.next;
        self.next = id.checked_add(1).ok_or(WindowError::IdentitiesExhausted)?;
        Ok(WindowId(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// Geometry and style known, no buffer
    Created,
    /// Buffer mapped but its contents are not presentable yet
    BufferAttached,
    /// The buffer holds a complete frame
    Ready,
    /// Minimized or occluded by policy; returns to `Ready` on the next frame
    Hidden,
    Destroyed,
}

/// Server-side window behaviors settable by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowProperty {
    /// Screen edge space other windows should avoid (panels, docks)
    ReservedZone(Insets),
    /// Stacking level; higher levels are always in front of lower ones
    Level(i32),
    /// Keep the window out of the compositor's frame snapshot
    ExcludeFromSnapshot(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    ReservedZone,
    Level,
    ExcludeFromSnapshot,
}

#[derive(Debug)]
pub struct WindowRecord {
    id: WindowId,
    geometry: Rect,
    frame: Rect,
    style: StyleMask,
    buttons: ButtonRects,
    state: WindowState,
    title: WindowTitle,
    icon: Option<WindowIcon>,
    buffer: Option<PresentationBuffer>,
    /// Process id of the owning client
    owner: Option<i32>,
    reserved_zone: Insets,
    level: i32,
    excluded: bool,
}

impl WindowRecord {
    /// Create a window with the next unused identity.
    pub fn create(
        ids: &mut WindowIdAllocator,
        geometry: Rect,
        style: StyleMask,
        title: &str,
    ) -> Result<Self, WindowError> {
        let frame = frame_for(geometry, style)?;
        let id = ids.allocate()?;
        let record = Self {
            id,
            geometry,
            frame,
            style,
            buttons: ButtonRects::compute(frame, style),
            state: WindowState::Created,
            title: WindowTitle::new(title),
            icon: None,
            buffer: None,
            owner: None,
            reserved_zone: Insets::ZERO,
            level: 0,
            excluded: false,
        };
        tracing::debug!(target: WINDOW, "Created window {} at {:?} style {:?}", id, geometry, style);
        Ok(record)
    }

    /// Tag the record with the pid of the client that owns it.
    pub fn with_owner(mut self, pid: i32) -> Self {
        self.owner = Some(pid);
        self
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn style_mask(&self) -> StyleMask {
        self.style
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn title(&self) -> &WindowTitle {
        &self.title
    }

    pub fn icon(&self) -> Option<&WindowIcon> {
        self.icon.as_ref()
    }

    pub fn buttons(&self) -> &ButtonRects {
        &self.buttons
    }

    pub fn owner(&self) -> Option<i32> {
        self.owner
    }

    pub fn buffer(&self) -> Option<&PresentationBuffer> {
        self.buffer.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == WindowState::Destroyed
    }

    /// Whether the compositor may read the buffer.
    pub fn is_presentable(&self) -> bool {
        matches!(self.state, WindowState::Ready | WindowState::Hidden)
    }

    /// Buffer contents, but only once a complete frame was published.
    pub fn presentable_pixels(&self) -> Option<&[u8]> {
        if !self.is_presentable() {
            return None;
        }
        self.buffer.as_ref().map(|b| b.pixels())
    }

    /// Sequence number of the frame currently in the buffer (0 = none).
    pub fn frame_seq(&self) -> u64 {
        self.buffer.as_ref().map_or(0, |b| b.published())
    }

    pub fn hit_test(&self, p: Point) -> FrameRegion {
        style::hit_test(self.geometry, self.frame, &self.buttons, self.style, p)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Map the client's shared-memory file. On failure the record keeps its
    /// state and any previous buffer; on success a previous buffer is
    /// released and its file unlinked.
    pub fn attach_buffer(&mut self, path: &Path, size: usize, cap: usize) -> Result<(), ServerError> {
        self.ensure_alive()?;

        let buffer = PresentationBuffer::map(path, size, cap).map_err(|e| {
            tracing::warn!(target: WINDOW, "Window {}: attach failed: {}", self.id, e);
            e
        })?;

        if let Some(old) = self.buffer.replace(buffer) {
            release_buffer(self.id, old);
        }
        self.state = WindowState::BufferAttached;
        tracing::debug!(target: WINDOW, "Window {} buffer attached ({} bytes)", self.id, size);
        Ok(())
    }

    /// The client finished drawing; the buffer becomes presentable.
    /// Returns the published frame sequence number.
    pub fn mark_ready(&mut self) -> Result<u64, WindowError> {
        match self.state {
            WindowState::Ready => Ok(self.frame_seq()),
            WindowState::BufferAttached | WindowState::Hidden => {
                let seq = match &self.buffer {
                    Some(buffer) => buffer.publish(),
                    None => return Err(self.invalid("mark_ready")),
                };
                self.state = WindowState::Ready;
                tracing::trace!(target: WINDOW, "Window {} ready (frame {})", self.id, seq);
                Ok(seq)
            }
            WindowState::Created => Err(self.invalid("mark_ready")),
            WindowState::Destroyed => Err(WindowError::UseAfterDestroy(self.id)),
        }
    }

    /// Minimize or occlude a presented window.
    pub fn hide(&mut self) -> Result<(), WindowError> {
        match self.state {
            WindowState::Ready => {
                self.state = WindowState::Hidden;
                Ok(())
            }
            WindowState::Hidden => Ok(()),
            WindowState::Destroyed => Err(WindowError::UseAfterDestroy(self.id)),
            _ => Err(self.invalid("hide")),
        }
    }

    /// Frame `geometry` would have under the current style.
    pub fn frame_for(&self, geometry: Rect) -> Result<Rect, WindowError> {
        frame_for(geometry, self.style)
    }

    /// Move or resize the content area. Rejected geometry leaves the
    /// window untouched.
    pub fn set_geometry(&mut self, geometry: Rect) -> Result<(), WindowError> {
        self.ensure_alive()?;
        self.frame = frame_for(geometry, self.style)?;
        self.geometry = geometry;
        self.buttons = ButtonRects::compute(self.frame, self.style);
        Ok(())
    }

    pub fn set_style_mask(&mut self, style: StyleMask) -> Result<(), WindowError> {
        self.ensure_alive()?;
        self.frame = frame_for(self.geometry, style)?;
        self.style = style;
        self.buttons = ButtonRects::compute(self.frame, self.style);
        Ok(())
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), WindowError> {
        self.ensure_alive()?;
        self.title = WindowTitle::new(title);
        Ok(())
    }

    /// Replace the icon with `width * height` ARGB pixels.
    pub fn set_icon(&mut self, width: u32, height: u32, pixels: Vec<u32>) -> Result<(), WindowError> {
        self.ensure_alive()?;
        let icon = WindowIcon::new(width, height, pixels)
            .ok_or(WindowError::InvalidIcon { width, height })?;
        self.icon = Some(icon);
        Ok(())
    }

    pub fn clear_icon(&mut self) -> Result<(), WindowError> {
        self.ensure_alive()?;
        self.icon = None;
        Ok(())
    }

    pub fn set_property(&mut self, property: WindowProperty) -> Result<(), WindowError> {
        self.ensure_alive()?;
        match property {
            WindowProperty::ReservedZone(insets) => self.reserved_zone = insets,
            WindowProperty::Level(level) => self.level = level,
            WindowProperty::ExcludeFromSnapshot(excluded) => self.excluded = excluded,
        }
        tracing::debug!(target: WINDOW, "Window {} property {:?}", self.id, property);
        Ok(())
    }

    pub fn property(&self, key: PropertyKey) -> WindowProperty {
        match key {
            PropertyKey::ReservedZone => WindowProperty::ReservedZone(self.reserved_zone),
            PropertyKey::Level => WindowProperty::Level(self.level),
            PropertyKey::ExcludeFromSnapshot => WindowProperty::ExcludeFromSnapshot(self.excluded),
        }
    }

    pub fn reserved_zone(&self) -> Insets {
        self.reserved_zone
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn is_excluded_from_snapshot(&self) -> bool {
        self.excluded
    }

    /// Unmap and unlink the buffer and enter the terminal state.
    pub fn destroy(&mut self) -> Result<(), WindowError> {
        self.ensure_alive()?;
        if let Some(buffer) = self.buffer.take() {
            release_buffer(self.id, buffer);
        }
        self.state = WindowState::Destroyed;
        tracing::debug!(target: WINDOW, "Window {} destroyed", self.id);
        Ok(())
    }

    fn ensure_alive(&self) -> Result<(), WindowError> {
        if self.is_destroyed() {
            Err(WindowError::UseAfterDestroy(self.id))
        } else {
            Ok(())
        }
    }

    fn invalid(&self, operation: &'static str) -> WindowError {
        WindowError::InvalidTransition {
            id: self.id,
            operation,
            state: self.state,
        }
    }
}

/// Content geometry grown by the decorations of `style`.
fn frame_for(geometry: Rect, style: StyleMask) -> Result<Rect, WindowError> {
    if geometry.width > i32::MAX as u32 || geometry.height > i32::MAX as u32 {
        return Err(WindowError::InvalidGeometry(geometry));
    }
    geometry
        .checked_expand(style::insets(style))
        .ok_or(WindowError::InvalidGeometry(geometry))
}

fn release_buffer(id: WindowId, buffer: PresentationBuffer) {
    match buffer.unlink() {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            target: WINDOW,
            "Window {}: could not unlink {}: {}",
            id,
            buffer.path().display(),
            e
        ),
    }
}

//! Capabilities the core consumes from the outside world.
//!
//! The application run loop, the drawing library and the decoration
//! painter all live outside this crate; the core only talks to them
//! through these traits.

use crate::core::input::TranslatedEvent;
use crate::core::surface::PresentationBuffer;
use crate::core::window::{TitlebarButton, WindowId, WindowRecord};
use crate::util::geometry::Point;

/// Sink for events drained by the input translator.
pub trait EventTarget {
    /// Returns whether the event was accepted. Rejected events are not retried.
    fn deliver(&mut self, event: TranslatedEvent) -> bool;
}

impl EventTarget for Vec<TranslatedEvent> {
    fn deliver(&mut self, event: TranslatedEvent) -> bool {
        self.push(event);
        true
    }
}

/// Window-addressed event crossing into the application run loop.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Input(TranslatedEvent),
    /// A titlebar button was released over itself
    ButtonActivated(TitlebarButton),
    FocusChanged { focused: bool },
    /// A frame marked ready was shown and the client may reuse the buffer
    FramePresented { seq: u64 },
    Destroyed,
}

/// The event dispatch boundary, implemented by whatever owns the
/// per-window client connections.
pub trait WindowEventDispatch {
    /// Returns whether the target window accepted the event.
    fn deliver(&mut self, event: WindowEvent, window: WindowId) -> bool;
}

impl WindowEventDispatch for Vec<(WindowId, WindowEvent)> {
    fn deliver(&mut self, event: WindowEvent, window: WindowId) -> bool {
        self.push((window, event));
        true
    }
}

/// Produces a drawable surface over a window's presentation buffer.
pub trait SurfaceProvider {
    type Surface;

    /// `None` when the drawing library cannot wrap this buffer.
    fn create_surface(&mut self, buffer: &PresentationBuffer) -> Option<Self::Surface>;
}

/// Paints window-frame decorations.
pub trait DecorationRenderer {
    type Context;

    fn draw_frame(&mut self, context: &mut Self::Context, record: &WindowRecord, pointer: Point);
}

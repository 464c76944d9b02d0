pub mod xkb;
pub mod keyboard;
pub mod pointer;
pub mod backend;
pub mod translator;

// Re-export key types for convenience
pub use backend::{InjectedBackend, Injector, InputBackend, LibinputBackend, RawEvent, RawEventKind};
pub use keyboard::KeyboardState;
pub use pointer::PointerState;
pub use translator::InputTranslator;
pub use xkb::{KeymapEngine, KeyTranslation, Keysym, LayoutDescriptor, ModifierMask};

use crate::util::geometry::Point;

/// Button/Key state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released = 0,
    Pressed = 1,
}

pub type ButtonState = KeyState;

/// Linux input button codes.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Pointer button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u32),
}

impl MouseButton {
    pub fn from_code(code: u32) -> Self {
        match code {
            BTN_LEFT => MouseButton::Left,
            BTN_RIGHT => MouseButton::Right,
            BTN_MIDDLE => MouseButton::Middle,
            other => MouseButton::Other(other),
        }
    }
}

/// Key press, release or synthesized repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    /// Raw evdev key code
    pub keycode: u32,
    pub state: KeyState,
    pub keysym: Keysym,
    pub unmodified_keysym: Keysym,
    pub text: String,
    pub modifiers: ModifierMask,
    pub is_repeat: bool,
    pub time_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    /// Absolute position after clamping
    pub position: Point,
    /// Position change actually applied
    pub delta: Point,
    pub time_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonEvent {
    pub button: MouseButton,
    pub state: ButtonState,
    /// 1 for a single click, 2 for a double click, ...
    pub click_count: u32,
    pub position: Point,
    pub modifiers: ModifierMask,
    pub time_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub horizontal: f64,
    pub vertical: f64,
    pub position: Point,
    pub modifiers: ModifierMask,
    pub time_ms: u32,
}

/// A device event normalized for the window system.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslatedEvent {
    Key(KeyEvent),
    PointerMotion(MotionEvent),
    PointerButton(ButtonEvent),
    Scroll(ScrollEvent),
    ModifiersChanged { modifiers: ModifierMask, time_ms: u32 },
}

impl TranslatedEvent {
    pub fn time_ms(&self) -> u32 {
        match self {
            TranslatedEvent::Key(e) => e.time_ms,
            TranslatedEvent::PointerMotion(e) => e.time_ms,
            TranslatedEvent::PointerButton(e) => e.time_ms,
            TranslatedEvent::Scroll(e) => e.time_ms,
            TranslatedEvent::ModifiersChanged { time_ms, .. } => *time_ms,
        }
    }

    /// Keyboard-class events follow keyboard focus; the rest follow the pointer.
    pub fn is_keyboard(&self) -> bool {
        matches!(
            self,
            TranslatedEvent::Key(_) | TranslatedEvent::ModifiersChanged { .. }
        )
    }
}

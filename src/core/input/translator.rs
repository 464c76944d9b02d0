//! Input translator.
//!
//! Drains the device backend, runs key transitions through the keymap
//! engine, tracks the pointer, and emits `TranslatedEvent`s in the exact
//! order the device stream produced them.

use std::os::unix::io::RawFd;

use crate::config::{KeyboardConfig, ServerConfig};
use crate::core::errors::{ConfigError, DeviceError};
use crate::core::input::backend::{InputBackend, LibinputBackend, RawEvent, RawEventKind};
use crate::core::input::keyboard::KeyboardState;
use crate::core::input::pointer::{ClickThreshold, PointerState};
use crate::core::input::xkb::{KeymapEngine, LayoutDescriptor, ModifierMask};
use crate::core::input::{
    ButtonEvent, KeyEvent, KeyState, MotionEvent, MouseButton, ScrollEvent, TranslatedEvent,
};
use crate::core::traits::EventTarget;
use crate::util::geometry::{Point, Rect};
use crate::util::logging::INPUT;

/// A device currently known to the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub name: String,
    pub keyboard: bool,
    pub pointer: bool,
}

/// Counters for one translator instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStats {
    pub translated: u64,
    /// Unsupported event kinds that were dropped
    pub dropped: u64,
    /// Events the target refused
    pub rejected: u64,
}

pub struct InputTranslator {
    backend: Box<dyn InputBackend>,
    keymap: KeymapEngine,
    keyboard: KeyboardState,
    pointer: PointerState,
    keyboard_config: KeyboardConfig,
    devices: Vec<InputDevice>,
    stats: InputStats,
}

impl std::fmt::Debug for InputTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputTranslator")
            .field("backend", &self.backend.name())
            .field("devices", &self.devices)
            .field("pointer", &self.pointer.position)
            .field("stats", &self.stats)
            .finish()
    }
}

impl InputTranslator {
    /// Compile the keymap the configuration names.
    pub fn load_keymap(config: &ServerConfig) -> Result<KeymapEngine, ConfigError> {
        let descriptor = config.keyboard.layout_descriptor()?;
        KeymapEngine::load_keymap(&descriptor)
    }

    /// Open the device manager around a compiled keymap. The caller decides
    /// whether running without devices is acceptable.
    pub fn open(config: &ServerConfig, keymap: KeymapEngine) -> Result<Self, DeviceError> {
        let backend = LibinputBackend::open(&config.seat.name, &config.seat.devices)?;
        Ok(Self::with_backend(Box::new(backend), keymap, config))
    }

    /// Build a translator over an already opened backend.
    pub fn with_backend(
        backend: Box<dyn InputBackend>,
        keymap: KeymapEngine,
        config: &ServerConfig,
    ) -> Self {
        let threshold = ClickThreshold {
            interval_ms: config.pointer.double_click_ms,
            distance: config.pointer.double_click_distance,
        };
        Self {
            backend,
            keymap,
            keyboard: KeyboardState::new(
                config.keyboard.repeat_delay_ms,
                config.keyboard.repeat_rate_hz,
            ),
            pointer: PointerState::new(config.screen.rect(), threshold),
            keyboard_config: config.keyboard.clone(),
            devices: Vec::new(),
            stats: InputStats::default(),
        }
    }

    /// Descriptor for the hosting event loop to poll.
    pub fn file_descriptor(&self) -> RawFd {
        self.backend.raw_fd()
    }

    /// Drain everything currently available and forward the translated
    /// events to `target`. Returns the number of events forwarded.
    pub fn process_pending(&mut self, target: &mut dyn EventTarget) -> Result<usize, DeviceError> {
        self.backend.dispatch()?;

        let mut forwarded = 0;
        while let Some(raw) = self.backend.next_event() {
            let mut events = Vec::with_capacity(2);
            self.translate(raw, &mut events);
            for event in events {
                forwarded += 1;
                self.forward(event, target);
            }
        }
        Ok(forwarded)
    }

    /// Emit synthesized repeat presses due at `now_ms`.
    pub fn dispatch_repeats(&mut self, now_ms: u32, target: &mut dyn EventTarget) -> usize {
        let Some(keycode) = self.keyboard.check_repeat(now_ms) else {
            return 0;
        };
        if !self.keyboard.is_pressed(keycode) {
            return 0;
        }

        let repeat = self.keymap.lookup(keycode);
        let event = TranslatedEvent::Key(KeyEvent {
            keycode,
            state: KeyState::Pressed,
            keysym: repeat.keysym,
            unmodified_keysym: repeat.unmodified_keysym,
            text: repeat.text,
            modifiers: repeat.modifiers,
            is_repeat: true,
            time_ms: now_ms,
        });
        self.forward(event, target);
        1
    }

    /// Update the pointer clamp rectangle; applies from the next motion.
    pub fn set_screen_geometry(&mut self, rect: Rect) {
        tracing::debug!(target: INPUT, "Screen geometry now {:?}", rect);
        self.pointer.set_screen(rect);
    }

    /// Replace the keymap; held keys are forgotten.
    pub fn switch_layout(&mut self, descriptor: &LayoutDescriptor) -> Result<(), ConfigError> {
        self.keymap.switch_layout(descriptor)?;
        self.keyboard.reset();
        Ok(())
    }

    pub fn modifier_mask(&self) -> ModifierMask {
        self.keymap.modifier_mask()
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    pub fn keymap(&self) -> &KeymapEngine {
        &self.keymap
    }

    pub fn devices(&self) -> &[InputDevice] {
        &self.devices
    }

    pub fn repeat_delay(&self) -> u32 {
        self.keyboard.repeat_delay
    }

    pub fn stats(&self) -> InputStats {
        self.stats
    }

    fn forward(&mut self, event: TranslatedEvent, target: &mut dyn EventTarget) {
        self.stats.translated += 1;
        tracing::trace!(target: INPUT, "{:?}", event);
        if !target.deliver(event) {
            self.stats.rejected += 1;
        }
    }

    fn translate(&mut self, raw: RawEvent, out: &mut Vec<TranslatedEvent>) {
        let time_ms = raw.time_ms;
        match raw.kind {
            RawEventKind::DeviceAdded { name, keyboard, pointer } => {
                if keyboard {
                    self.keyboard.repeat_delay = self.keyboard_config.repeat_delay_for(&name);
                    tracing::debug!(
                        target: INPUT,
                        "Keyboard {} added, repeat delay {} ms",
                        name,
                        self.keyboard.repeat_delay
                    );
                }
                tracing::info!(target: INPUT, "Device added: {}", name);
                self.devices.push(InputDevice { name, keyboard, pointer });
            }
            RawEventKind::DeviceRemoved { name } => {
                tracing::info!(target: INPUT, "Device removed: {}", name);
                if let Some(pos) = self.devices.iter().position(|d| d.name == name) {
                    self.devices.remove(pos);
                }
                if let Some(last) = self.devices.iter().rev().find(|d| d.keyboard) {
                    self.keyboard.repeat_delay = self.keyboard_config.repeat_delay_for(&last.name);
                }
            }
            RawEventKind::Key { keycode, state } => {
                let translation = self.keymap.update_state(keycode, state);
                let pressed = state == KeyState::Pressed;
                let repeats = KeyboardState::should_repeat(
                    self.keymap.key_repeats(keycode),
                    translation.keysym,
                );
                self.keyboard.track_key(keycode, pressed, repeats, time_ms);

                let modifiers_changed = translation.modifiers_changed;
                let modifiers = translation.modifiers;
                out.push(TranslatedEvent::Key(KeyEvent {
                    keycode,
                    state,
                    keysym: translation.keysym,
                    unmodified_keysym: translation.unmodified_keysym,
                    text: translation.text,
                    modifiers,
                    is_repeat: false,
                    time_ms,
                }));
                if modifiers_changed {
                    out.push(TranslatedEvent::ModifiersChanged { modifiers, time_ms });
                }
            }
            RawEventKind::PointerMotion { dx, dy } => {
                let delta = self.pointer.move_by(dx, dy);
                out.push(self.motion_event(delta, time_ms));
            }
            RawEventKind::PointerMotionAbsolute { x, y } => {
                let screen = self.pointer.screen;
                let target = Point::new(
                    screen.x as f64 + x * screen.width as f64,
                    screen.y as f64 + y * screen.height as f64,
                );
                let delta = self.pointer.move_to(target);
                out.push(self.motion_event(delta, time_ms));
            }
            RawEventKind::PointerButton { button, state } => {
                let button = MouseButton::from_code(button);
                let click_count =
                    self.pointer
                        .update_button(button, state == KeyState::Pressed, time_ms);
                out.push(TranslatedEvent::PointerButton(ButtonEvent {
                    button,
                    state,
                    click_count,
                    position: self.pointer.position,
                    modifiers: self.keymap.modifier_mask(),
                    time_ms,
                }));
            }
            RawEventKind::Scroll { horizontal, vertical } => {
                out.push(TranslatedEvent::Scroll(ScrollEvent {
                    horizontal,
                    vertical,
                    position: self.pointer.position,
                    modifiers: self.keymap.modifier_mask(),
                    time_ms,
                }));
            }
            RawEventKind::Unsupported(kind) => {
                self.stats.dropped += 1;
                tracing::trace!(target: INPUT, "Dropped unsupported {} event", kind);
            }
        }
    }

    fn motion_event(&self, delta: Point, time_ms: u32) -> TranslatedEvent {
        TranslatedEvent::PointerMotion(MotionEvent {
            position: self.pointer.position,
            delta,
            time_ms,
        })
    }
}

//! Server context.
//!
//! Owns every piece of server state for the life of the process. The
//! reactor calls into it on each wake-up; nothing here blocks.

use std::os::unix::io::RawFd;

use nix::time::{clock_gettime, ClockId};

use crate::config::ServerConfig;
use crate::core::errors::{ConfigError, DeviceError, WindowError};
use crate::core::input::{ButtonEvent, InputTranslator, KeyState, MouseButton, TranslatedEvent};
use crate::core::traits::{EventTarget, WindowEvent, WindowEventDispatch};
use crate::core::window::{FocusManager, FrameRegion, TitlebarButton, WindowHandle, WindowId, WindowRegistry};
use crate::util::geometry::{Point, Rect};
use crate::util::logging::SERVER;

/// Pointer bookkeeping that outlives a single event.
#[derive(Debug, Default)]
struct PointerRouting {
    /// Buttons currently held; the implicit grab lasts while non-zero
    held: u32,
    /// Titlebar button that received the press of the current grab
    armed: Option<ArmedButton>,
}

/// A titlebar button pressed but not yet released.
#[derive(Debug, Clone, Copy)]
struct ArmedButton {
    window: WindowId,
    button: TitlebarButton,
    /// Pointer button whose release resolves it
    pressed_with: MouseButton,
}

pub struct ServerContext {
    config: ServerConfig,
    input: InputTranslator,
    registry: WindowRegistry,
    focus: FocusManager,
    routing: PointerRouting,
    screen: Rect,
}

impl ServerContext {
    /// Open the input devices and set up an empty registry. A server
    /// without an input backend cannot run, so device failures are fatal
    /// here.
    pub fn open(config: ServerConfig) -> Result<Self, ConfigError> {
        let keymap = InputTranslator::load_keymap(&config)?;
        let input = InputTranslator::open(&config, keymap).map_err(ConfigError::Backend)?;
        Ok(Self::with_input(config, input))
    }

    /// Build around an already opened translator.
    pub fn with_input(config: ServerConfig, input: InputTranslator) -> Self {
        let screen = config.screen.rect();
        let registry = WindowRegistry::from_config(&config);
        tracing::info!(target: SERVER, "Server context ready, screen {}x{}", screen.width, screen.height);
        Self {
            config,
            input,
            registry,
            focus: FocusManager::new(),
            routing: PointerRouting::default(),
            screen,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn input(&self) -> &InputTranslator {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputTranslator {
        &mut self.input
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WindowRegistry {
        &mut self.registry
    }

    pub fn focus(&self) -> &FocusManager {
        &self.focus
    }

    pub fn screen(&self) -> Rect {
        self.screen
    }

    /// Descriptor the reactor polls for input.
    pub fn input_fd(&self) -> RawFd {
        self.input.file_descriptor()
    }

    /// Outputs changed.
    pub fn set_screen_geometry(&mut self, screen: Rect) {
        self.screen = screen;
        self.input.set_screen_geometry(screen);
        self.registry.set_screen(screen);
    }

    /// Area left for ordinary windows once panels claimed their zones.
    pub fn usable_area(&self) -> Rect {
        self.registry.usable_area(self.screen)
    }

    // =========================================================================
    // Reactor entry points
    // =========================================================================

    /// Drain pending input and route it to windows. Returns how many
    /// events were translated.
    pub fn tick(&mut self, target: &mut dyn WindowEventDispatch) -> Result<usize, DeviceError> {
        let mut router = Router {
            registry: &mut self.registry,
            focus: &mut self.focus,
            routing: &mut self.routing,
            target,
        };
        self.input.process_pending(&mut router)
    }

    /// Emit key repeats due at `now_ms`.
    pub fn dispatch_repeats(&mut self, now_ms: u32, target: &mut dyn WindowEventDispatch) -> usize {
        let mut router = Router {
            registry: &mut self.registry,
            focus: &mut self.focus,
            routing: &mut self.routing,
            target,
        };
        self.input.dispatch_repeats(now_ms, &mut router)
    }

    /// Give keyboard focus to `handle` and raise it.
    pub fn activate(&mut self, handle: WindowHandle, target: &mut dyn WindowEventDispatch) -> Result<(), WindowError> {
        if self.registry.lookup(handle).is_none() {
            return Err(WindowError::UnknownWindow(handle));
        }
        self.registry.raise(handle);
        move_focus(&mut self.focus, Some(handle), target);
        Ok(())
    }

    /// The compositor showed `frames` (taken from a snapshot); tell each
    /// client whose frame is still current. Returns how many were told.
    pub fn frames_shown(&self, frames: &[(WindowHandle, u64)], target: &mut dyn WindowEventDispatch) -> usize {
        let mut told = 0;
        for &(id, seq) in frames {
            if self.registry.frame_presented(id, seq) && target.deliver(WindowEvent::FramePresented { seq }, id) {
                told += 1;
            }
        }
        told
    }

    /// Client closed a window.
    pub fn destroy_window(&mut self, handle: WindowHandle, target: &mut dyn WindowEventDispatch) -> Result<(), WindowError> {
        self.registry.unregister(handle)?;
        target.deliver(WindowEvent::Destroyed, handle);
        self.forget_window(handle, target);
        Ok(())
    }

    /// Destroy windows of clients that exited.
    pub fn reap_dead_clients(&mut self, target: &mut dyn WindowEventDispatch) -> Vec<WindowHandle> {
        let reaped = self.registry.reap_dead_clients();
        for &id in &reaped {
            target.deliver(WindowEvent::Destroyed, id);
            self.forget_window(id, target);
        }
        reaped
    }

    /// Tear down every window explicitly. Must be called before exit.
    pub fn shutdown(&mut self) -> usize {
        let count = self.registry.shutdown();
        self.focus = FocusManager::new();
        self.routing = PointerRouting::default();
        tracing::info!(target: SERVER, "Shut down, {} windows destroyed", count);
        count
    }

    fn forget_window(&mut self, handle: WindowHandle, target: &mut dyn WindowEventDispatch) {
        let had_focus = self.focus.has_keyboard_focus(handle);
        if self.routing.armed.is_some_and(|armed| armed.window == handle) {
            self.routing.armed = None;
        }
        let registry = &self.registry;
        let next = self.focus.forget(handle, |w| registry.lookup(w).is_some());
        if had_focus {
            if let Some(next) = next {
                self.registry.raise(next);
                target.deliver(WindowEvent::FocusChanged { focused: true }, next);
            }
        }
    }
}

/// Millisecond timestamp on the clock input devices stamp events with.
pub fn timestamp_ms() -> u32 {
    clock_gettime(ClockId::CLOCK_MONOTONIC)
        .map(|ts| (ts.tv_sec() as u64 * 1000 + ts.tv_nsec() as u64 / 1_000_000) as u32)
        .unwrap_or(0)
}

fn move_focus<T>(focus: &mut FocusManager, to: Option<WindowId>, target: &mut T)
where
    T: WindowEventDispatch + ?Sized,
{
    let previous = focus.keyboard_focus();
    if !focus.set_keyboard_focus(to) {
        return;
    }
    if let Some(prev) = previous {
        target.deliver(WindowEvent::FocusChanged { focused: false }, prev);
    }
    if let Some(to) = to {
        target.deliver(WindowEvent::FocusChanged { focused: true }, to);
    }
}

// =============================================================================
// Routing
// =============================================================================

/// Event sink that resolves the target window of each translated event.
struct Router<'a, T: WindowEventDispatch + ?Sized> {
    registry: &'a mut WindowRegistry,
    focus: &'a mut FocusManager,
    routing: &'a mut PointerRouting,
    target: &'a mut T,
}

impl<T: WindowEventDispatch + ?Sized> Router<'_, T> {
    fn pointer_window(&self, position: Point) -> Option<WindowId> {
        self.focus
            .grab()
            .or_else(|| self.registry.window_under(position))
    }

    fn send(&mut self, window: Option<WindowId>, event: TranslatedEvent) -> bool {
        match window {
            Some(id) => self.target.deliver(WindowEvent::Input(event), id),
            None => false,
        }
    }

    fn route_button(&mut self, event: TranslatedEvent, button: ButtonEvent) -> bool {
        let position = button.position;
        if button.state == KeyState::Pressed {
            let window = self.pointer_window(position);
            self.routing.held += 1;
            if self.routing.held == 1 {
                if let Some(id) = window {
                    self.focus.begin_grab(id);
                    self.registry.raise(id);
                    move_focus(&mut *self.focus, Some(id), &mut *self.target);
                    if let Some(FrameRegion::Button(pressed)) = self.hit(id, position) {
                        self.routing.armed = Some(ArmedButton {
                            window: id,
                            button: pressed,
                            pressed_with: button.button,
                        });
                        return true;
                    }
                }
            }
            return self.send(window, event);
        }

        let window = self.pointer_window(position);
        self.routing.held = self.routing.held.saturating_sub(1);
        if self.routing.held == 0 {
            self.focus.end_grab();
        }

        match self.routing.armed {
            Some(armed) if armed.pressed_with == button.button => {
                self.routing.armed = None;
                // Activation needs the release over the same, enabled button.
                let enabled = self
                    .registry
                    .lookup(armed.window)
                    .is_some_and(|r| r.buttons().is_enabled(armed.button));
                if enabled && self.hit(armed.window, position) == Some(FrameRegion::Button(armed.button)) {
                    tracing::debug!(target: SERVER, "Window {}: {:?} activated", armed.window, armed.button);
                    return self.target.deliver(WindowEvent::ButtonActivated(armed.button), armed.window);
                }
                false
            }
            _ => self.send(window, event),
        }
    }

    fn hit(&self, id: WindowId, position: Point) -> Option<FrameRegion> {
        self.registry.lookup(id).map(|r| r.hit_test(position))
    }
}

impl<T: WindowEventDispatch + ?Sized> EventTarget for Router<'_, T> {
    fn deliver(&mut self, event: TranslatedEvent) -> bool {
        if event.is_keyboard() {
            let window = self.focus.keyboard_focus();
            return self.send(window, event);
        }
        match &event {
            TranslatedEvent::PointerMotion(motion) => {
                let window = self.pointer_window(motion.position);
                self.focus.set_pointer_focus(window);
                self.send(window, event)
            }
            TranslatedEvent::Scroll(scroll) => {
                let window = self.pointer_window(scroll.position);
                self.send(window, event)
            }
            TranslatedEvent::PointerButton(button) => {
                let button = *button;
                self.route_button(event, button)
            }
            TranslatedEvent::Key(_) | TranslatedEvent::ModifiersChanged { .. } => false,
        }
    }
}

//! Device backends feeding the input translator.
//!
//! `LibinputBackend` owns the udev enumerator and libinput event stream.
//! `InjectedBackend` carries events pushed by an embedding platform (or by
//! tests) through the same drain path.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use input::event::device::DeviceEvent;
use input::event::keyboard::{KeyboardEvent, KeyboardEventTrait};
use input::event::pointer::{Axis, PointerEvent, PointerEventTrait, PointerScrollEvent};
use input::event::EventTrait;
use input::{DeviceCapability, Event, Libinput, LibinputInterface};

use crate::core::errors::DeviceError;
use crate::core::input::KeyState;
use crate::util::logging::INPUT;

/// A device event before keymap and pointer-state processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Device timestamp (ms, CLOCK_MONOTONIC)
    pub time_ms: u32,
    pub kind: RawEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawEventKind {
    DeviceAdded { name: String, keyboard: bool, pointer: bool },
    DeviceRemoved { name: String },
    Key { keycode: u32, state: KeyState },
    PointerMotion { dx: f64, dy: f64 },
    /// Position normalized to 0..1 on both axes
    PointerMotionAbsolute { x: f64, y: f64 },
    PointerButton { button: u32, state: KeyState },
    Scroll { horizontal: f64, vertical: f64 },
    /// Event class the window system does not handle (touch, tablet, ...)
    Unsupported(&'static str),
}

/// Source of raw device events.
pub trait InputBackend {
    /// Pollable descriptor, readable when events are pending.
    fn raw_fd(&self) -> RawFd;

    /// Read pending data from the devices without blocking.
    fn dispatch(&mut self) -> Result<(), DeviceError>;

    /// Next queued event, if any.
    fn next_event(&mut self) -> Option<RawEvent>;

    fn name(&self) -> &'static str;
}

// ============================================================================
// libinput
// ============================================================================

/// Opens device nodes with exactly the access libinput asks for.
struct RestrictedInterface;

impl LibinputInterface for RestrictedInterface {
    fn open_restricted(&mut self, path: &Path, flags: i32) -> Result<OwnedFd, i32> {
        let access = flags & libc::O_ACCMODE;
        OpenOptions::new()
            .read(access == libc::O_RDONLY || access == libc::O_RDWR)
            .write(access == libc::O_WRONLY || access == libc::O_RDWR)
            .custom_flags((flags & !libc::O_ACCMODE) | libc::O_CLOEXEC | libc::O_NONBLOCK)
            .open(path)
            .map(|file| {
                tracing::debug!(target: INPUT, "Opened {}", path.display());
                OwnedFd::from(file)
            })
            .map_err(|e| {
                tracing::warn!(target: INPUT, "Cannot open {}: {}", path.display(), e);
                e.raw_os_error().unwrap_or(libc::EIO)
            })
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        drop(File::from(fd));
    }
}

pub struct LibinputBackend {
    libinput: Libinput,
    kind: &'static str,
}

impl std::fmt::Debug for LibinputBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibinputBackend").field("kind", &self.kind).finish()
    }
}

impl LibinputBackend {
    /// Assign `seat` through udev, falling back to opening `devices`
    /// directly. Fails if neither yields a usable context.
    pub fn open(seat: &str, devices: &[PathBuf]) -> Result<Self, DeviceError> {
        let mut udev = Libinput::new_with_udev(RestrictedInterface);
        if udev.udev_assign_seat(seat).is_ok() {
            tracing::info!(target: INPUT, "libinput bound to udev seat {}", seat);
            return Ok(Self {
                libinput: udev,
                kind: "udev",
            });
        }
        tracing::warn!(target: INPUT, "udev seat {} unavailable, trying device paths", seat);

        if devices.is_empty() {
            return Err(DeviceError::NoBackend {
                seat: seat.to_string(),
                reason: "seat assignment failed and no device paths are configured".to_string(),
            });
        }

        let mut path_ctx = Libinput::new_from_path(RestrictedInterface);
        let mut added = 0;
        for device in devices {
            let added_device = device
                .to_str()
                .and_then(|p| path_ctx.path_add_device(p));
            match added_device {
                Some(_) => added += 1,
                None => tracing::warn!(target: INPUT, "Could not add {}", device.display()),
            }
        }

        if added == 0 {
            return Err(DeviceError::NoBackend {
                seat: seat.to_string(),
                reason: "none of the configured device paths could be opened".to_string(),
            });
        }

        tracing::info!(target: INPUT, "libinput path backend with {} devices", added);
        Ok(Self {
            libinput: path_ctx,
            kind: "path",
        })
    }
}

impl InputBackend for LibinputBackend {
    fn raw_fd(&self) -> RawFd {
        self.libinput.as_raw_fd()
    }

    fn dispatch(&mut self) -> Result<(), DeviceError> {
        self.libinput.dispatch().map_err(DeviceError::Dispatch)
    }

    fn next_event(&mut self) -> Option<RawEvent> {
        self.libinput.next().map(convert_event)
    }

    fn name(&self) -> &'static str {
        self.kind
    }
}

fn convert_event(event: Event) -> RawEvent {
    let (time_ms, kind) = match event {
        Event::Device(DeviceEvent::Added(ev)) => {
            let device = ev.device();
            (
                0,
                RawEventKind::DeviceAdded {
                    name: device.name().to_string(),
                    keyboard: device.has_capability(DeviceCapability::Keyboard),
                    pointer: device.has_capability(DeviceCapability::Pointer),
                },
            )
        }
        Event::Device(DeviceEvent::Removed(ev)) => (
            0,
            RawEventKind::DeviceRemoved {
                name: ev.device().name().to_string(),
            },
        ),
        Event::Keyboard(KeyboardEvent::Key(ev)) => (
            ev.time(),
            RawEventKind::Key {
                keycode: ev.key(),
                state: match ev.key_state() {
                    input::event::keyboard::KeyState::Pressed => KeyState::Pressed,
                    input::event::keyboard::KeyState::Released => KeyState::Released,
                },
            },
        ),
        Event::Pointer(PointerEvent::Motion(ev)) => (
            ev.time(),
            RawEventKind::PointerMotion {
                dx: ev.dx(),
                dy: ev.dy(),
            },
        ),
        Event::Pointer(PointerEvent::MotionAbsolute(ev)) => (
            ev.time(),
            RawEventKind::PointerMotionAbsolute {
                x: ev.absolute_x_transformed(1),
                y: ev.absolute_y_transformed(1),
            },
        ),
        Event::Pointer(PointerEvent::Button(ev)) => (
            ev.time(),
            RawEventKind::PointerButton {
                button: ev.button(),
                state: match ev.button_state() {
                    input::event::pointer::ButtonState::Pressed => KeyState::Pressed,
                    input::event::pointer::ButtonState::Released => KeyState::Released,
                },
            },
        ),
        Event::Pointer(PointerEvent::ScrollWheel(ev)) => (ev.time(), scroll_kind(&ev)),
        Event::Pointer(PointerEvent::ScrollFinger(ev)) => (ev.time(), scroll_kind(&ev)),
        Event::Pointer(PointerEvent::ScrollContinuous(ev)) => (ev.time(), scroll_kind(&ev)),
        // The legacy axis event repeats what the scroll events above carry.
        #[allow(deprecated)]
        Event::Pointer(PointerEvent::Axis(_)) => (0, RawEventKind::Unsupported("axis")),
        Event::Pointer(_) => (0, RawEventKind::Unsupported("pointer")),
        Event::Touch(_) => (0, RawEventKind::Unsupported("touch")),
        Event::Tablet(_) | Event::TabletPad(_) => (0, RawEventKind::Unsupported("tablet")),
        Event::Gesture(_) => (0, RawEventKind::Unsupported("gesture")),
        Event::Switch(_) => (0, RawEventKind::Unsupported("switch")),
        _ => (0, RawEventKind::Unsupported("other")),
    };
    RawEvent { time_ms, kind }
}

/// Wheel, finger and continuous scrolling all become the same raw event.
fn scroll_kind<E: PointerScrollEvent>(ev: &E) -> RawEventKind {
    scroll_amounts(|axis| ev.has_axis(axis).then(|| ev.scroll_value(axis)))
}

/// Build a scroll event from per-axis values; absent axes scroll by zero.
pub(crate) fn scroll_amounts(value: impl Fn(Axis) -> Option<f64>) -> RawEventKind {
    RawEventKind::Scroll {
        horizontal: value(Axis::Horizontal).unwrap_or(0.0),
        vertical: value(Axis::Vertical).unwrap_or(0.0),
    }
}

// ============================================================================
// Injected events
// ============================================================================

type SharedQueue = Rc<RefCell<VecDeque<RawEvent>>>;

/// Backend fed by an [`Injector`]. Its descriptor becomes readable whenever
/// events are pushed, so it polls like a real device stream.
#[derive(Debug)]
pub struct InjectedBackend {
    queue: SharedQueue,
    wake_rx: UnixStream,
}

/// Producer side of an [`InjectedBackend`].
#[derive(Debug, Clone)]
pub struct Injector {
    queue: SharedQueue,
    wake_tx: Rc<UnixStream>,
}

impl InjectedBackend {
    pub fn new() -> Result<(Self, Injector), DeviceError> {
        let (wake_tx, wake_rx) = UnixStream::pair()?;
        wake_tx.set_nonblocking(true)?;
        wake_rx.set_nonblocking(true)?;
        let queue = SharedQueue::default();
        Ok((
            Self {
                queue: queue.clone(),
                wake_rx,
            },
            Injector {
                queue,
                wake_tx: Rc::new(wake_tx),
            },
        ))
    }
}

impl Injector {
    pub fn push(&self, time_ms: u32, kind: RawEventKind) {
        self.queue.borrow_mut().push_back(RawEvent { time_ms, kind });
        // A full socket buffer already means "readable".
        let _ = (&*self.wake_tx).write(&[1]);
    }

    pub fn key(&self, time_ms: u32, keycode: u32, state: KeyState) {
        self.push(time_ms, RawEventKind::Key { keycode, state });
    }

    pub fn motion(&self, time_ms: u32, dx: f64, dy: f64) {
        self.push(time_ms, RawEventKind::PointerMotion { dx, dy });
    }

    pub fn button(&self, time_ms: u32, button: u32, state: KeyState) {
        self.push(time_ms, RawEventKind::PointerButton { button, state });
    }
}

impl InputBackend for InjectedBackend {
    fn raw_fd(&self) -> RawFd {
        self.wake_rx.as_raw_fd()
    }

    fn dispatch(&mut self) -> Result<(), DeviceError> {
        let mut buf = [0u8; 64];
        loop {
            match (&self.wake_rx).read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DeviceError::Dispatch(e)),
            }
        }
    }

    fn next_event(&mut self) -> Option<RawEvent> {
        self.queue.borrow_mut().pop_front()
    }

    fn name(&self) -> &'static str {
        "injected"
    }
}

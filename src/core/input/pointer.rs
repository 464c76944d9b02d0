use crate::core::input::MouseButton;
use crate::util::geometry::{Point, Rect};

/// Multi-click detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickThreshold {
    pub interval_ms: u32,
    pub distance: f64,
}

impl Default for ClickThreshold {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            distance: 4.0,
        }
    }
}

/// The last press, used to chain multi-clicks.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LastClick {
    button: MouseButton,
    position: Point,
    /// Press time, moved to the release time once the button comes up
    time_ms: u32,
    count: u32,
}

/// Pointer state, managing position, buttons and click counting.
#[derive(Debug, Clone)]
pub struct PointerState {
    /// Absolute pointer position in screen coordinates
    pub position: Point,
    pub left: bool,
    pub right: bool,
    pub middle: bool,
    /// Number of buttons currently pressed (for implicit grab tracking)
    pub button_count: u32,
    /// Motion is clamped to this rectangle
    pub screen: Rect,
    pub threshold: ClickThreshold,
    last_click: Option<LastClick>,
}

impl PointerState {
    pub fn new(screen: Rect, threshold: ClickThreshold) -> Self {
        let position = Point::new(
            screen.x as f64 + screen.width as f64 / 2.0,
            screen.y as f64 + screen.height as f64 / 2.0,
        );
        Self {
            position: screen.clamp(position),
            left: false,
            right: false,
            middle: false,
            button_count: 0,
            screen,
            threshold,
            last_click: None,
        }
    }

    /// Replace the clamp rectangle. The current position is left alone; the
    /// next motion event is clamped against the new rectangle.
    pub fn set_screen(&mut self, screen: Rect) {
        self.screen = screen;
    }

    /// Apply a relative motion; returns the delta actually applied.
    pub fn move_by(&mut self, dx: f64, dy: f64) -> Point {
        let target = Point::new(self.position.x + dx, self.position.y + dy);
        self.move_to(target)
    }

    /// Jump to an absolute position; returns the delta actually applied.
    pub fn move_to(&mut self, target: Point) -> Point {
        let clamped = self.screen.clamp(target);
        let delta = Point::new(clamped.x - self.position.x, clamped.y - self.position.y);
        self.position = clamped;
        delta
    }

    /// Track press/release and return the click count for this transition.
    pub fn update_button(&mut self, button: MouseButton, pressed: bool, time_ms: u32) -> u32 {
        match button {
            MouseButton::Left => self.left = pressed,
            MouseButton::Right => self.right = pressed,
            MouseButton::Middle => self.middle = pressed,
            MouseButton::Other(_) => {}
        }

        if pressed {
            self.button_count = self.button_count.saturating_add(1);
            self.register_press(button, time_ms)
        } else {
            self.button_count = self.button_count.saturating_sub(1);
            self.register_release(button, time_ms)
        }
    }

    pub fn is_pressed(&self, button: MouseButton) -> bool {
        match button {
            MouseButton::Left => self.left,
            MouseButton::Right => self.right,
            MouseButton::Middle => self.middle,
            MouseButton::Other(_) => false,
        }
    }

    /// Whether the pointer has an implicit grab (buttons pressed)
    pub fn has_implicit_grab(&self) -> bool {
        self.button_count > 0
    }

    fn register_press(&mut self, button: MouseButton, time_ms: u32) -> u32 {
        let count = match self.last_click {
            Some(last) if last.button == button && self.within_threshold(&last, time_ms) => {
                last.count + 1
            }
            _ => 1,
        };
        self.last_click = Some(LastClick {
            button,
            position: self.position,
            time_ms,
            count,
        });
        count
    }

    fn register_release(&mut self, button: MouseButton, time_ms: u32) -> u32 {
        match self.last_click.as_mut() {
            Some(last) if last.button == button => {
                last.time_ms = time_ms;
                last.count
            }
            _ => 1,
        }
    }

    fn within_threshold(&self, last: &LastClick, time_ms: u32) -> bool {
        let elapsed = time_ms.wrapping_sub(last.time_ms);
        elapsed <= self.threshold.interval_ms
            && last.position.distance_to(self.position) <= self.threshold.distance
    }
}

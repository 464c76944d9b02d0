use crate::core::input::Keysym;

/// Keyboard bookkeeping for the translator: held keys and key repeat.
///
/// All times are device timestamps in milliseconds (CLOCK_MONOTONIC).
#[derive(Debug, Clone)]
pub struct KeyboardState {
    /// Currently held evdev codes, in press order
    pub pressed_keys: Vec<u32>,
    /// Key repeat configuration
    pub repeat_rate: u32,
    pub repeat_delay: u32,
    /// Key repeat tracking
    repeat_key: Option<RepeatingKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RepeatingKey {
    keycode: u32,
    pressed_at: u32,
    last_repeat_at: Option<u32>,
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new(500, 33)
    }
}

impl KeyboardState {
    pub fn new(repeat_delay: u32, repeat_rate: u32) -> Self {
        Self {
            pressed_keys: Vec::new(),
            repeat_rate,
            repeat_delay,
            repeat_key: None,
        }
    }

    /// Record a key transition. `repeats` arms key repeat for a press.
    pub fn track_key(&mut self, keycode: u32, pressed: bool, repeats: bool, time_ms: u32) {
        if pressed {
            if !self.pressed_keys.contains(&keycode) {
                self.pressed_keys.push(keycode);
            }
            if repeats {
                self.repeat_key = Some(RepeatingKey {
                    keycode,
                    pressed_at: time_ms,
                    last_repeat_at: None,
                });
            }
        } else {
            self.pressed_keys.retain(|&k| k != keycode);
            if self.repeat_key.map(|r| r.keycode) == Some(keycode) {
                self.repeat_key = None;
            }
        }
    }

    pub fn is_pressed(&self, keycode: u32) -> bool {
        self.pressed_keys.contains(&keycode)
    }

    /// Whether a key press arms repeat: the keymap says it repeats and it
    /// is not a modifier.
    pub fn should_repeat(keymap_repeats: bool, keysym: Keysym) -> bool {
        keymap_repeats && !keysym.is_modifier() && !keysym.is_none()
    }

    /// Check if a key repeat event should fire. Returns the keycode to repeat, if any.
    pub fn check_repeat(&mut self, now_ms: u32) -> Option<u32> {
        if self.repeat_rate == 0 {
            return None;
        }

        let key = self.repeat_key.as_mut()?;
        let elapsed = now_ms.wrapping_sub(key.pressed_at);
        if elapsed > u32::MAX / 2 || elapsed < self.repeat_delay {
            return None;
        }

        let interval = (1000 / self.repeat_rate).max(1);
        match key.last_repeat_at {
            Some(last) if now_ms.wrapping_sub(last) < interval => None,
            _ => {
                key.last_repeat_at = Some(now_ms);
                Some(key.keycode)
            }
        }
    }

    /// Forget held keys and repeat state, e.g. after a keymap switch.
    pub fn reset(&mut self) {
        self.pressed_keys.clear();
        self.repeat_key = None;
    }
}

//! Server configuration.
//!
//! Loaded once at startup from a TOML file. Every section has defaults so an
//! empty or missing file yields a usable configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::errors::ConfigError;
use crate::core::input::xkb::LayoutDescriptor;
use crate::util::geometry::Rect;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "WSD_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub seat: SeatConfig,
    pub keyboard: KeyboardConfig,
    pub pointer: PointerConfig,
    pub screen: ScreenConfig,
    pub buffers: BufferConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeatConfig {
    /// udev seat to assign (e.g. "seat0")
    pub name: String,
    /// Device nodes opened directly when udev is unavailable
    pub devices: Vec<PathBuf>,
}

impl Default for SeatConfig {
    fn default() -> Self {
        Self {
            name: "seat0".to_string(),
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: Option<String>,
    /// Compiled keymap text; takes precedence over the RMLVO names
    pub keymap_file: Option<PathBuf>,
    /// Key repeat delay (ms)
    pub repeat_delay_ms: u32,
    /// Key repeat rate (Hz), 0 disables repeat
    pub repeat_rate_hz: u32,
    /// Repeat delay overrides keyed by device name
    pub device_repeat_delay_ms: HashMap<String, u32>,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            rules: "evdev".to_string(),
            model: String::new(),
            layout: "us".to_string(),
            variant: String::new(),
            options: None,
            keymap_file: None,
            repeat_delay_ms: 500,
            repeat_rate_hz: 33,
            device_repeat_delay_ms: HashMap::new(),
        }
    }
}

impl KeyboardConfig {
    /// Build the layout descriptor the keymap engine compiles.
    pub fn layout_descriptor(&self) -> Result<LayoutDescriptor, ConfigError> {
        if let Some(path) = &self.keymap_file {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            return Ok(LayoutDescriptor::Text(text));
        }

        Ok(LayoutDescriptor::Names {
            rules: self.rules.clone(),
            model: self.model.clone(),
            layout: self.layout.clone(),
            variant: self.variant.clone(),
            options: self.options.clone(),
        })
    }

    /// Repeat delay for a newly added keyboard.
    pub fn repeat_delay_for(&self, device_name: &str) -> u32 {
        self.device_repeat_delay_ms
            .get(device_name)
            .copied()
            .unwrap_or(self.repeat_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    /// Max interval between a release and the next press of a multi-click (ms)
    pub double_click_ms: u32,
    /// Max pointer travel between clicks of a multi-click (px)
    pub double_click_distance: f64,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            double_click_ms: 300,
            double_click_distance: 4.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl ScreenConfig {
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// A window buffer may hold at most this many screens' worth of pixels
    pub safety_margin: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { safety_margin: 2 }
    }
}

impl ServerConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    target: crate::util::logging::CONFIG,
                    "Config {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolve the config path from an explicit argument or `WSD_CONFIG`.
    pub fn resolve(arg: Option<PathBuf>) -> Result<Self, ConfigError> {
        match arg.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from)) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServerConfig::from_toml("", Path::new("test.toml")).unwrap();
        assert_eq!(config.seat.name, "seat0");
        assert_eq!(config.keyboard.repeat_delay_ms, 500);
        assert_eq!(config.pointer.double_click_ms, 300);
        assert_eq!(config.buffers.safety_margin, 2);
    }

    #[test]
    fn test_partial_sections_and_device_overrides() {
        let text = r#"
            [keyboard]
            layout = "de"
            repeat_delay_ms = 250

            [keyboard.device_repeat_delay_ms]
            "Slow Keyboard" = 900

            [screen]
            width = 800
            height = 600
        "#;
        let config = ServerConfig::from_toml(text, Path::new("test.toml")).unwrap();
        assert_eq!(config.keyboard.layout, "de");
        assert_eq!(config.keyboard.rules, "evdev");
        assert_eq!(config.keyboard.repeat_delay_for("Slow Keyboard"), 900);
        assert_eq!(config.keyboard.repeat_delay_for("Other"), 250);
        assert_eq!(config.screen.rect(), Rect::new(0, 0, 800, 600));
    }

    #[test]
    fn test_malformed_config_is_a_parse_error() {
        let err = ServerConfig::from_toml("[screen]\nwidth = \"wide\"", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ServerConfig::load(Path::new("/nonexistent/wsd.toml")).unwrap();
        assert_eq!(config.screen.width, 1920);
    }
}

//! Common imports and types used throughout the window server.

pub use std::collections::HashMap;

pub use crate::core::errors::{BufferError, ConfigError, DeviceError, ServerError, WindowError};
pub use crate::util::geometry::{Insets, Point, Rect};

/// Defaults to the aggregated server error.
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

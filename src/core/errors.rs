//! Core error types

use std::path::PathBuf;

use thiserror::Error;

use crate::core::window::{WindowId, WindowState};
use crate::util::geometry::Rect;

/// Unrecoverable startup problems: the server cannot run without these.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("keymap could not be compiled: {0}")]
    Keymap(String),

    #[error("input backend unavailable: {0}")]
    Backend(#[from] DeviceError),
}

/// Device enumeration or open failures.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no input backend available (udev seat {seat}: {reason})")]
    NoBackend { seat: String, reason: String },

    #[error("input dispatch failed: {0}")]
    Dispatch(#[from] std::io::Error),
}

/// Per-window shared-memory problems. The window keeps its previous state.
#[derive(Error, Debug)]
pub enum BufferError {
    #[error("buffer of {requested} bytes exceeds the per-window cap of {cap} bytes")]
    SizeExceeded { requested: usize, cap: usize },

    #[error("failed to map {path}: {reason}")]
    MapFailed { path: PathBuf, reason: String },
}

/// Window lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("window {0} has already been destroyed")]
    UseAfterDestroy(WindowId),

    #[error("window {id}: {operation} is not valid in state {state:?}")]
    InvalidTransition {
        id: WindowId,
        operation: &'static str,
        state: WindowState,
    },

    #[error("unknown window {0}")]
    UnknownWindow(WindowId),

    #[error("window {0} is already registered")]
    DuplicateIdentity(WindowId),

    #[error("window identities exhausted")]
    IdentitiesExhausted,

    #[error("geometry {0:?} leaves no room for the window frame")]
    InvalidGeometry(Rect),

    #[error("icon pixel data does not match {width}x{height}")]
    InvalidIcon { width: u32, height: u32 },
}

/// Top-level error aggregating every subsystem.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

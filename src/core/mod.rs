pub mod errors;
pub mod traits;
pub mod input;
pub mod surface;
pub mod window;
pub mod context;

// Re-export key types
pub use context::{timestamp_ms, ServerContext};
pub use errors::{BufferError, ConfigError, DeviceError, ServerError, WindowError};
pub use traits::{DecorationRenderer, EventTarget, SurfaceProvider, WindowEvent, WindowEventDispatch};

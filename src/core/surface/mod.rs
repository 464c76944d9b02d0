pub mod buffer;

pub use buffer::{buffer_cap, PresentationBuffer, BYTES_PER_PIXEL};

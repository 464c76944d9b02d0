pub mod style;
pub mod title;
pub mod record;
pub mod tree;
pub mod focus;
pub mod registry;
pub mod managed;

pub use focus::FocusManager;
pub use managed::ManagedWindow;
pub use record::{PropertyKey, WindowId, WindowIdAllocator, WindowProperty, WindowRecord, WindowState};
pub use registry::{WindowHandle, WindowRegistry};
pub use style::{ButtonRects, FrameRegion, StyleMask, TitlebarButton};
pub use title::{WindowIcon, WindowTitle, MAX_TITLE_GLYPHS};
pub use tree::WindowTree;

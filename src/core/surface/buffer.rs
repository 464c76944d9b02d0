//! Shared-memory presentation buffers.
//!
//! The client creates and sizes a regular file, draws into it, and tells the
//! server the frame is complete. The server maps the file read-only and
//! never touches the pixels until the owning window is `Ready`.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, AtomicU64, Ordering};

use memmap2::{Mmap, MmapOptions};

use crate::core::errors::BufferError;
use crate::util::logging::BUFFER;

/// Fixed premultiplied 32-bit pixel format.
pub const BYTES_PER_PIXEL: usize = 4;

/// Largest buffer a window may attach on a `width`x`height` screen.
pub fn buffer_cap(width: u32, height: u32, safety_margin: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(BYTES_PER_PIXEL)
        .saturating_mul(safety_margin as usize)
}

pub struct PresentationBuffer {
    path: PathBuf,
    size: usize,
    map: Mmap,
    /// Frames the client has published into this buffer
    published: AtomicU64,
}

impl std::fmt::Debug for PresentationBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationBuffer")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("published", &self.published())
            .finish()
    }
}

impl PresentationBuffer {
    /// Map `size` bytes of the file at `path`. Sizes above `cap` are refused
    /// before the file is even opened.
    pub fn map(path: &Path, size: usize, cap: usize) -> Result<Self, BufferError> {
        if size > cap {
            return Err(BufferError::SizeExceeded { requested: size, cap });
        }

        let map_failed = |reason: String| BufferError::MapFailed {
            path: path.to_path_buf(),
            reason,
        };

        if size == 0 {
            return Err(map_failed("zero-sized buffer".to_string()));
        }

        let file = File::open(path).map_err(|e| map_failed(e.to_string()))?;
        let meta = file.metadata().map_err(|e| map_failed(e.to_string()))?;
        if !meta.is_file() {
            return Err(map_failed("not a regular file".to_string()));
        }
        if meta.len() < size as u64 {
            return Err(map_failed(format!(
                "file holds {} bytes, {} requested",
                meta.len(),
                size
            )));
        }

        // SAFETY: the mapping is read-only and private to this process; the
        // client may write concurrently, which only affects pixel values, and
        // readers go through `pixels()` which borrows `self`.
        let map = unsafe { MmapOptions::new().len(size).map(&file) }
            .map_err(|e| map_failed(e.to_string()))?;

        tracing::debug!(target: BUFFER, "Mapped {} ({} bytes)", path.display(), size);
        Ok(Self {
            path: path.to_path_buf(),
            size,
            map,
            published: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether a `width`x`height` image fits in the buffer.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(BYTES_PER_PIXEL))
            .is_some_and(|bytes| bytes <= self.size)
    }

    /// Raw pixel bytes. Only meaningful after the client published a frame.
    pub fn pixels(&self) -> &[u8] {
        &self.map
    }

    /// Record that the client finished a frame. The acquire fence orders
    /// every later read of the mapping after the client's writes; the
    /// release store lets any reader that observes the new sequence number
    /// see those writes too.
    pub fn publish(&self) -> u64 {
        fence(Ordering::Acquire);
        self.published.fetch_add(1, Ordering::Release) + 1
    }

    /// Sequence number of the latest published frame (0 = none yet).
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Remove the backing file. The mapping itself goes away on drop.
    pub fn unlink(&self) -> io::Result<()> {
        std::fs::remove_file(&self.path)
    }
}

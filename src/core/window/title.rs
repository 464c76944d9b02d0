//! Window titles and their fixed-capacity glyph run.
//!
//! The decoration renderer receives the title as a run of at most
//! [`MAX_TITLE_GLYPHS`] glyphs. Longer titles are cut at a character
//! boundary and the last kept slot is replaced by an ellipsis, so the
//! renderer always sees that the title was shortened.

/// Capacity of the glyph run handed to the decoration renderer.
pub const MAX_TITLE_GLYPHS: usize = 128;

/// Marker placed in the last slot of a truncated run.
pub const ELLIPSIS: char = '\u{2026}';

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowTitle {
    text: String,
    glyphs: Vec<char>,
    truncated: bool,
}

impl WindowTitle {
    pub fn new(text: &str) -> Self {
        let mut glyphs: Vec<char> = text
            .chars()
            .filter(|c| !c.is_control())
            .take(MAX_TITLE_GLYPHS + 1)
            .collect();
        let truncated = glyphs.len() > MAX_TITLE_GLYPHS;
        if truncated {
            glyphs.truncate(MAX_TITLE_GLYPHS - 1);
            glyphs.push(ELLIPSIS);
        }

        Self {
            text: text.to_string(),
            glyphs,
            truncated,
        }
    }

    /// The full title as the client set it.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The run sent to the decoration renderer; never longer than
    /// [`MAX_TITLE_GLYPHS`].
    pub fn glyphs(&self) -> &[char] {
        &self.glyphs
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Optional window icon, 32-bit premultiplied pixels in row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowIcon {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl WindowIcon {
    /// `None` if `pixels` does not hold exactly `width * height` entries.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        (expected == pixels.len() && expected > 0).then_some(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

//! Window style masks and decoration metrics.
//!
//! Every decoration rectangle is a pure function of the frame and the style
//! mask, so records can recompute them whenever either changes.

use bitflags::bitflags;

use crate::util::geometry::{Insets, Point, Rect};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleMask: u32 {
        const TITLED         = 1 << 0;
        const CLOSABLE       = 1 << 1;
        const MINIATURIZABLE = 1 << 2;
        const RESIZABLE      = 1 << 3;
        /// Panel-style window with a compact titlebar
        const UTILITY        = 1 << 4;
    }
}

impl StyleMask {
    pub const BORDERLESS: StyleMask = StyleMask::empty();

    pub fn is_borderless(&self) -> bool {
        !self.intersects(StyleMask::TITLED | StyleMask::RESIZABLE)
    }
}

/// Fixed decoration sizes for one family of styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationMetrics {
    pub titlebar_height: u32,
    pub border: u32,
    pub button_size: u32,
    /// Gap between the frame edge and the first button, and between buttons
    pub button_spacing: u32,
}

pub const STANDARD_METRICS: DecorationMetrics = DecorationMetrics {
    titlebar_height: 22,
    border: 1,
    button_size: 15,
    button_spacing: 4,
};

pub const UTILITY_METRICS: DecorationMetrics = DecorationMetrics {
    titlebar_height: 16,
    border: 1,
    button_size: 11,
    button_spacing: 3,
};

pub fn metrics(mask: StyleMask) -> DecorationMetrics {
    if mask.contains(StyleMask::UTILITY) {
        UTILITY_METRICS
    } else {
        STANDARD_METRICS
    }
}

/// Space the decorations add around the client content.
pub fn insets(mask: StyleMask) -> Insets {
    let m = metrics(mask);
    if mask.contains(StyleMask::TITLED) {
        Insets::new(m.titlebar_height, m.border, m.border, m.border)
    } else if mask.contains(StyleMask::RESIZABLE) {
        Insets::new(m.border, m.border, m.border, m.border)
    } else {
        Insets::ZERO
    }
}

/// The titlebar strip along the top of the frame, if the style has one.
pub fn titlebar_rect(frame: Rect, mask: StyleMask) -> Option<Rect> {
    mask.contains(StyleMask::TITLED)
        .then(|| Rect::new(frame.x, frame.y, frame.width, metrics(mask).titlebar_height))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TitlebarButton {
    Close,
    Miniaturize,
    Zoom,
}

/// Titlebar button hit rectangles. Every titled window has all three in
/// fixed slots from the left edge; the style's capability bits decide which
/// of them are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonRects {
    pub close: Option<Rect>,
    pub miniaturize: Option<Rect>,
    pub zoom: Option<Rect>,
    enabled: StyleMask,
}

impl ButtonRects {
    pub fn compute(frame: Rect, mask: StyleMask) -> Self {
        if !mask.contains(StyleMask::TITLED) {
            return Self::default();
        }

        let m = metrics(mask);
        let y = frame.y.saturating_add_unsigned((m.titlebar_height - m.button_size) / 2);
        let slot = |index: u32| {
            let offset = m.border + m.button_spacing + index * (m.button_size + m.button_spacing);
            let rect = Rect::new(frame.x.saturating_add_unsigned(offset), y, m.button_size, m.button_size);
            // Narrow frames drop buttons that would spill out of the titlebar.
            (rect.right() <= frame.right()).then_some(rect)
        };

        Self {
            close: slot(0),
            miniaturize: slot(1),
            zoom: slot(2),
            enabled: mask & (StyleMask::CLOSABLE | StyleMask::MINIATURIZABLE | StyleMask::RESIZABLE),
        }
    }

    /// Whether clicking `button` does anything for this style.
    pub fn is_enabled(&self, button: TitlebarButton) -> bool {
        let capability = match button {
            TitlebarButton::Close => StyleMask::CLOSABLE,
            TitlebarButton::Miniaturize => StyleMask::MINIATURIZABLE,
            TitlebarButton::Zoom => StyleMask::RESIZABLE,
        };
        self.enabled.contains(capability)
    }

    pub fn get(&self, button: TitlebarButton) -> Option<Rect> {
        match button {
            TitlebarButton::Close => self.close,
            TitlebarButton::Miniaturize => self.miniaturize,
            TitlebarButton::Zoom => self.zoom,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TitlebarButton, Rect)> + '_ {
        [
            TitlebarButton::Close,
            TitlebarButton::Miniaturize,
            TitlebarButton::Zoom,
        ]
        .into_iter()
        .filter_map(|b| self.get(b).map(|r| (b, r)))
    }

    pub fn button_at(&self, p: Point) -> Option<TitlebarButton> {
        self.iter().find(|(_, r)| r.contains(p)).map(|(b, _)| b)
    }
}

/// Which part of a decorated window a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRegion {
    Button(TitlebarButton),
    Titlebar,
    Border,
    Content,
    Outside,
}

pub fn hit_test(geometry: Rect, frame: Rect, buttons: &ButtonRects, mask: StyleMask, p: Point) -> FrameRegion {
    if !frame.contains(p) {
        return FrameRegion::Outside;
    }
    if let Some(button) = buttons.button_at(p) {
        return FrameRegion::Button(button);
    }
    if geometry.contains(p) {
        return FrameRegion::Content;
    }
    match titlebar_rect(frame, mask) {
        Some(bar) if bar.contains(p) => FrameRegion::Titlebar,
        _ => FrameRegion::Border,
    }
}

//! Integer screen geometry shared by windows, decorations and the pointer clamp.
//!
//! Screen space has its origin at the top-left corner and y grows downwards.

use serde::Deserialize;

/// A point in screen space. Pointer positions are fractional.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge, saturated to the `i32` range.
    pub fn right(&self) -> i32 {
        saturate(self.x as i64 + self.width as i64)
    }

    pub fn bottom(&self) -> i32 {
        saturate(self.y as i64 + self.height as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x as f64
            && p.x < self.right() as f64
            && p.y >= self.y as f64
            && p.y < self.bottom() as f64
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Grow the rectangle outwards by `insets`. Returns `None` unless the
    /// result, edges included, is representable in screen space.
    pub fn checked_expand(&self, insets: Insets) -> Option<Rect> {
        let x = self.x as i64 - insets.left as i64;
        let y = self.y as i64 - insets.top as i64;
        let width = self.width as i64 + insets.left as i64 + insets.right as i64;
        let height = self.height as i64 + insets.top as i64 + insets.bottom as i64;
        let fits = |v: i64| (i32::MIN as i64..=i32::MAX as i64).contains(&v);
        if !(fits(x) && fits(y) && fits(x + width) && fits(y + height)) {
            return None;
        }
        Some(Rect::new(x as i32, y as i32, width as u32, height as u32))
    }

    /// Grow the rectangle outwards by `insets`, saturating at the edges of
    /// screen space.
    pub fn expand(&self, insets: Insets) -> Rect {
        Rect {
            x: self.x.saturating_sub_unsigned(insets.left),
            y: self.y.saturating_sub_unsigned(insets.top),
            width: self.width.saturating_add(insets.left).saturating_add(insets.right),
            height: self.height.saturating_add(insets.top).saturating_add(insets.bottom),
        }
    }

    /// Shrink the rectangle inwards by `insets`, never below zero size.
    pub fn inset(&self, insets: Insets) -> Rect {
        Rect {
            x: self.x.saturating_add_unsigned(insets.left),
            y: self.y.saturating_add_unsigned(insets.top),
            width: self.width.saturating_sub(insets.left.saturating_add(insets.right)),
            height: self.height.saturating_sub(insets.top.saturating_add(insets.bottom)),
        }
    }

    /// Clamp a point so it lies on a pixel inside the rectangle.
    /// An empty rectangle collapses every point onto its origin.
    pub fn clamp(&self, p: Point) -> Point {
        let max_x = (self.x as f64 + self.width as f64 - 1.0).max(self.x as f64);
        let max_y = (self.y as f64 + self.height as f64 - 1.0).max(self.y as f64);
        Point {
            x: p.x.clamp(self.x as f64, max_x),
            y: p.y.clamp(self.y as f64, max_y),
        }
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Per-edge distances, used for decoration insets and reserved screen zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub struct Insets {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Insets {
    pub const ZERO: Insets = Insets { top: 0, left: 0, bottom: 0, right: 0 };

    pub const fn new(top: u32, left: u32, bottom: u32, right: u32) -> Self {
        Self { top, left, bottom, right }
    }

    /// Edge-wise maximum of two inset sets.
    pub fn max(self, other: Insets) -> Insets {
        Insets {
            top: self.top.max(other.top),
            left: self.left.max(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.max(other.right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_then_inset_is_identity() {
        let r = Rect::new(10, 20, 300, 200);
        let insets = Insets::new(22, 1, 1, 1);
        assert_eq!(r.expand(insets), Rect::new(9, -2, 302, 223));
        assert_eq!(r.expand(insets).inset(insets), r);
    }

    #[test]
    fn test_expand_rejects_unrepresentable_frames() {
        let titled = Insets::new(22, 1, 1, 1);
        assert_eq!(Rect::new(0, 0, u32::MAX, 100).checked_expand(titled), None);
        assert_eq!(Rect::new(i32::MIN, 0, 100, 100).checked_expand(titled), None);
        assert_eq!(Rect::new(i32::MAX - 50, 0, 100, 100).checked_expand(titled), None);
        assert_eq!(
            Rect::new(0, 0, 800, 600).checked_expand(titled),
            Some(Rect::new(-1, -22, 802, 623))
        );

        // The saturating form never panics.
        let grown = Rect::new(i32::MIN, 0, u32::MAX, 100).expand(titled);
        assert_eq!(grown.x, i32::MIN);
        assert_eq!(grown.width, u32::MAX);
    }

    #[test]
    fn test_edges_saturate_for_wide_rects() {
        let wide = Rect::new(0, 0, 3_000_000_000, 10);
        assert_eq!(wide.right(), i32::MAX);
        assert!(wide.right() > wide.x);
    }

    #[test]
    fn test_clamp_keeps_points_on_screen() {
        let screen = Rect::new(0, 0, 1920, 1080);
        assert_eq!(screen.clamp(Point::new(-5.0, 2000.0)), Point::new(0.0, 1079.0));
        assert_eq!(screen.clamp(Point::new(100.5, 20.25)), Point::new(100.5, 20.25));
        assert_eq!(Rect::new(5, 5, 0, 0).clamp(Point::new(50.0, 50.0)), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_intersects_is_exclusive_at_edges() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(!a.intersects(&Rect::new(10, 0, 10, 10)));
        assert!(a.intersects(&Rect::new(9, 9, 10, 10)));
    }
}

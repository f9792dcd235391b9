use std::collections::HashMap;

use crate::tree::NodeId;

/// Axis-aligned box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Overlap on both axes; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Shrink by `margin` on every side, never below zero size.
    pub fn inset(&self, margin: f32) -> Rect {
        let dx = margin.min(self.width / 2.0);
        let dy = margin.min(self.height / 2.0);
        Rect::new(self.x + dx, self.y + dy, self.width - 2.0 * dx, self.height - 2.0 * dy)
    }
}

/// Visible part of the page plus the margin a highlight must clear to count
/// as on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: Rect,
    pub margin: f32,
}

impl Viewport {
    pub fn new(bounds: Rect, margin: f32) -> Self {
        Self { bounds, margin }
    }

    pub fn is_visible(&self, rect: &Rect) -> bool {
        self.bounds.inset(self.margin).intersects(rect)
    }

    /// Move so that `rect` sits in the middle of the viewport.
    pub fn center_on(&mut self, rect: &Rect) {
        let cx = rect.x + rect.width / 2.0;
        let cy = rect.y + rect.height / 2.0;
        self.bounds.x = (cx - self.bounds.width / 2.0).max(0.0);
        self.bounds.y = (cy - self.bounds.height / 2.0).max(0.0);
    }
}

/// Layout information the host provides for scroll decisions.
pub trait Layout {
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    fn viewport(&self) -> Rect;

    fn scroll_into_view(&mut self, node: NodeId);
}

/// A layout with fixed boxes per node, for headless hosts and tests.
#[derive(Debug, Clone)]
pub struct FixedLayout {
    viewport: Viewport,
    boxes: HashMap<NodeId, Rect>,
    scrolls: usize,
}

impl FixedLayout {
    pub fn new(viewport: Rect) -> Self {
        Self {
            viewport: Viewport::new(viewport, 0.0),
            boxes: HashMap::new(),
            scrolls: 0,
        }
    }

    pub fn place(&mut self, node: NodeId, rect: Rect) {
        self.boxes.insert(node, rect);
    }

    /// How many times `scroll_into_view` actually moved the viewport.
    pub fn scroll_count(&self) -> usize {
        self.scrolls
    }
}

impl Layout for FixedLayout {
    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        self.boxes.get(&node).copied()
    }

    fn viewport(&self) -> Rect {
        self.viewport.bounds
    }

    fn scroll_into_view(&mut self, node: NodeId) {
        if let Some(rect) = self.boxes.get(&node) {
            self.viewport.center_on(rect);
            self.scrolls += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_both_axes() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(a.intersects(&Rect::new(50.0, 50.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(150.0, 50.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(50.0, 150.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(100.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_margin_counts_edge_as_hidden() {
        let vp = Viewport::new(Rect::new(0.0, 0.0, 800.0, 600.0), 48.0);
        assert!(vp.is_visible(&Rect::new(100.0, 300.0, 40.0, 16.0)));
        // peeking 10px over the bottom edge is inside the margin
        assert!(!vp.is_visible(&Rect::new(100.0, 590.0, 40.0, 16.0)));
    }

    #[test]
    fn test_center_on() {
        let mut vp = Viewport::new(Rect::new(0.0, 0.0, 800.0, 600.0), 0.0);
        vp.center_on(&Rect::new(0.0, 2000.0, 100.0, 20.0));
        assert_eq!(vp.bounds.y, 2010.0 - 300.0);
        assert_eq!(vp.bounds.x, 0.0);
    }

    #[test]
    fn test_inset_never_inverts() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0).inset(48.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.height, 0.0);
    }
}

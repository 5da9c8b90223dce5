//! Screen ↔ scene mapping over a fixed-size virtual canvas.
//!
//! The canvas surface is several times larger than the visible viewport and
//! starts centered under it; panning moves the surface, zooming rescales it
//! around a screen-space anchor.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;
/// Toolbar zoom buttons multiply/divide by this.
pub const ZOOM_STEP: f64 = 1.2;
pub const WHEEL_ZOOM_IN: f64 = 1.1;
pub const WHEEL_ZOOM_OUT: f64 = 0.9;

pub const CANVAS_MIN_SIZE: f64 = 5000.0;
pub const CANVAS_MULTIPLIER: f64 = 3.0;
/// Viewport changes at or below this many pixels don't resize the canvas.
pub const RESIZE_THRESHOLD: f64 = 100.0;

// ─── Viewport transform ──────────────────────────────────────────────────

/// Uniform scale plus a translation in screen pixels.
/// Persisted as the 2-D matrix `[sx, 0, 0, sy, tx, ty]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct ViewportTransform {
    pub scale: f64,
    pub translate: Vec2,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
        }
    }
}

impl From<[f64; 6]> for ViewportTransform {
    fn from(m: [f64; 6]) -> Self {
        let scale = if m[0].is_finite() && m[0] > 0.0 {
            m[0].clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        Self {
            scale,
            translate: Vec2::new(m[4], m[5]),
        }
    }
}

impl From<ViewportTransform> for [f64; 6] {
    fn from(v: ViewportTransform) -> Self {
        [v.scale, 0.0, 0.0, v.scale, v.translate.x, v.translate.y]
    }
}

impl ViewportTransform {
    /// Scale 1 with the canvas centered under the viewport.
    pub fn centered(canvas: &VirtualCanvas, viewport: Size) -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::new(
                -(canvas.width - viewport.width) / 2.0,
                -(canvas.height - viewport.height) / 2.0,
            ),
        }
    }

    /// Scene → screen.
    pub fn affine(&self) -> Affine {
        Affine::translate(self.translate) * Affine::scale(self.scale)
    }

    pub fn screen_to_scene(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.translate.x) / self.scale,
            (p.y - self.translate.y) / self.scale,
        )
    }

    pub fn scene_to_screen(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.translate.x,
            p.y * self.scale + self.translate.y,
        )
    }

    /// Set the zoom level keeping the scene point under `anchor` fixed.
    /// Returns the clamped scale actually applied.
    pub fn set_zoom(&mut self, scale: f64, anchor: Point) -> f64 {
        let pinned = self.screen_to_scene(anchor);
        self.scale = scale.clamp(MIN_ZOOM, MAX_ZOOM);
        self.translate = Vec2::new(
            anchor.x - pinned.x * self.scale,
            anchor.y - pinned.y * self.scale,
        );
        self.scale
    }

    pub fn zoom_by(&mut self, factor: f64, anchor: Point) -> f64 {
        self.set_zoom(self.scale * factor, anchor)
    }

    pub fn zoom_in(&mut self, anchor: Point) -> f64 {
        self.zoom_by(ZOOM_STEP, anchor)
    }

    pub fn zoom_out(&mut self, anchor: Point) -> f64 {
        self.zoom_by(1.0 / ZOOM_STEP, anchor)
    }

    /// Wheel zoom at the pointer. Scrolling down (positive delta) zooms out.
    pub fn wheel(&mut self, delta_y: f64, pointer: Point) -> f64 {
        let factor = if delta_y > 0.0 {
            WHEEL_ZOOM_OUT
        } else {
            WHEEL_ZOOM_IN
        };
        self.zoom_by(factor, pointer)
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.translate += Vec2::new(dx, dy);
    }

    /// Scene-space rectangle currently visible in a viewport of `size`.
    pub fn visible_rect(&self, size: Size) -> Rect {
        Rect::from_points(
            self.screen_to_scene(Point::ZERO),
            self.screen_to_scene(Point::new(size.width, size.height)),
        )
    }
}

// ─── Virtual canvas ──────────────────────────────────────────────────────

/// The finite drawing surface behind the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualCanvas {
    pub width: f64,
    pub height: f64,
    /// Viewport size the canvas was last sized for.
    pub viewport: Size,
}

impl VirtualCanvas {
    pub fn for_viewport(viewport: Size) -> Self {
        Self {
            width: (viewport.width * CANVAS_MULTIPLIER).max(CANVAS_MIN_SIZE),
            height: (viewport.height * CANVAS_MULTIPLIER).max(CANVAS_MIN_SIZE),
            viewport,
        }
    }

    /// Restore a saved size (never smaller than what the viewport needs).
    pub fn restored(width: f64, height: f64, viewport: Size) -> Self {
        let fitted = Self::for_viewport(viewport);
        Self {
            width: width.max(fitted.width),
            height: height.max(fitted.height),
            viewport,
        }
    }

    /// Re-size for a new viewport. Returns false (and changes nothing)
    /// unless a dimension moved by more than the threshold.
    pub fn resize(&mut self, viewport: Size) -> bool {
        let dw = (viewport.width - self.viewport.width).abs();
        let dh = (viewport.height - self.viewport.height).abs();
        if dw <= RESIZE_THRESHOLD && dh <= RESIZE_THRESHOLD {
            return false;
        }
        *self = Self::for_viewport(viewport);
        true
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.size())
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn canvas_sizing() {
        let small = VirtualCanvas::for_viewport(Size::new(1200.0, 800.0));
        assert_eq!((small.width, small.height), (5000.0, 5000.0));

        let big = VirtualCanvas::for_viewport(Size::new(2000.0, 1000.0));
        assert_eq!((big.width, big.height), (6000.0, 5000.0));
    }

    #[test]
    fn resize_threshold() {
        let mut canvas = VirtualCanvas::for_viewport(Size::new(2000.0, 1000.0));
        assert!(!canvas.resize(Size::new(2080.0, 1000.0)));
        assert_eq!(canvas.width, 6000.0);
        assert!(canvas.resize(Size::new(2200.0, 1000.0)));
        assert_eq!(canvas.width, 6600.0);
    }

    #[test]
    fn centered_under_viewport() {
        let viewport = Size::new(1000.0, 600.0);
        let canvas = VirtualCanvas::for_viewport(viewport);
        let vt = ViewportTransform::centered(&canvas, viewport);
        assert_eq!(vt.translate, Vec2::new(-2000.0, -2200.0));
        let mid = vt.screen_to_scene(Point::new(500.0, 300.0));
        assert!(close(mid, canvas.center()));
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut vt = ViewportTransform {
            scale: 1.0,
            translate: Vec2::new(-100.0, -50.0),
        };
        let anchor = Point::new(320.0, 240.0);
        let before = vt.screen_to_scene(anchor);
        vt.zoom_in(anchor);
        vt.wheel(-1.0, anchor);
        let after = vt.screen_to_scene(anchor);
        assert!(close(before, after));
        assert!((vt.scale - 1.2 * 1.1).abs() < 1e-9);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vt = ViewportTransform::default();
        for _ in 0..40 {
            vt.zoom_in(Point::ZERO);
        }
        assert_eq!(vt.scale, MAX_ZOOM);
        for _ in 0..80 {
            vt.wheel(10.0, Point::new(5.0, 5.0));
        }
        assert_eq!(vt.scale, MIN_ZOOM);
        assert_eq!(vt.set_zoom(f64::MAX, Point::ZERO), MAX_ZOOM);
    }

    #[test]
    fn serializes_as_matrix() {
        let vt = ViewportTransform {
            scale: 2.0,
            translate: Vec2::new(-10.0, 5.0),
        };
        let json = serde_json::to_string(&vt).unwrap();
        assert_eq!(json, "[2.0,0.0,0.0,2.0,-10.0,5.0]");
        let back: ViewportTransform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vt);
    }

    #[test]
    fn screen_scene_roundtrip() {
        let mut vt = ViewportTransform::default();
        vt.pan(30.0, -12.0);
        vt.set_zoom(2.5, Point::new(100.0, 100.0));
        let p = Point::new(42.0, 17.0);
        assert!(close(vt.scene_to_screen(vt.screen_to_scene(p)), p));
    }
}

//! Shape construction helpers shared by the drawing tools.
//!
//! Every builder returns geometry normalized so the local bounding box starts
//! at `(0, 0)`, with the scene-space origin returned alongside.

use crate::model::{ObjectKind, PathCmd, path_bounds};
use kurbo::{Point, Rect};

/// Shortest arrowhead segment, in scene units.
pub const ARROW_MIN_LENGTH: f64 = 15.0;
/// Angle between the shaft and each arrowhead segment.
pub const ARROW_HALF_ANGLE: f64 = std::f64::consts::FRAC_PI_6;

/// Normalize a drag from `a` to `b` so the result has min corner + size.
pub fn normalize_rect(a: Point, b: Point) -> Rect {
    Rect::from_points(a, b)
}

/// Circle dragged from `a` to `b`: centered on the midpoint, radius half
/// the distance.
pub fn circle_from_drag(a: Point, b: Point) -> (Point, f64) {
    (a.midpoint(b), a.distance(b) / 2.0)
}

pub fn arrow_length(stroke_width: f64) -> f64 {
    ARROW_MIN_LENGTH.max(stroke_width * 3.0)
}

/// The two wing tips of an arrowhead pointing at `end`.
pub fn arrowhead(start: Point, end: Point, stroke_width: f64) -> [Point; 2] {
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let len = arrow_length(stroke_width);
    let wing = |a: f64| Point::new(end.x - len * a.cos(), end.y - len * a.sin());
    [wing(angle - ARROW_HALF_ANGLE), wing(angle + ARROW_HALF_ANGLE)]
}

/// A straight line from `a` to `b`, as (origin, local line kind).
pub fn line_shape(a: Point, b: Point) -> (Point, ObjectKind) {
    let origin = Point::new(a.x.min(b.x), a.y.min(b.y));
    let kind = ObjectKind::Line {
        x1: a.x - origin.x,
        y1: a.y - origin.y,
        x2: b.x - origin.x,
        y2: b.y - origin.y,
    };
    (origin, kind)
}

/// Two-segment arrowhead path for a shaft from `start` to `end`.
pub fn arrowhead_shape(start: Point, end: Point, stroke_width: f64) -> (Point, ObjectKind) {
    let [w1, w2] = arrowhead(start, end, stroke_width);
    let commands = vec![
        PathCmd::MoveTo(end.x, end.y),
        PathCmd::LineTo(w1.x, w1.y),
        PathCmd::MoveTo(end.x, end.y),
        PathCmd::LineTo(w2.x, w2.y),
    ];
    normalized_path(commands)
}

/// Shift a path so its bounding box starts at the local origin.
pub fn normalized_path(commands: Vec<PathCmd>) -> (Point, ObjectKind) {
    let origin = path_bounds(&commands).map_or(Point::ZERO, |r| r.origin());
    let commands = commands
        .into_iter()
        .map(|c| c.translated(-origin.x, -origin.y))
        .collect();
    (origin, ObjectKind::Path { commands })
}

/// Freehand stroke through `points`, smoothed with quadratic segments that
/// pass through the midpoints between samples.
pub fn smooth_stroke(points: &[Point]) -> Vec<PathCmd> {
    let Some((&first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let mut commands = vec![PathCmd::MoveTo(first.x, first.y)];
    if rest.is_empty() {
        // Single click: a dot.
        commands.push(PathCmd::LineTo(first.x, first.y));
        return commands;
    }
    for pair in points.windows(2).skip(1) {
        let (ctrl, next) = (pair[0], pair[1]);
        let mid = ctrl.midpoint(next);
        commands.push(PathCmd::QuadTo(ctrl.x, ctrl.y, mid.x, mid.y));
    }
    if let Some(last) = points.last() {
        commands.push(PathCmd::LineTo(last.x, last.y));
    }
    commands
}

/// Clamp `proposed` so it lies within `bounds` and is at least
/// `min_size` on each side (unless `bounds` itself is smaller).
pub fn constrain_rect(proposed: Rect, bounds: Rect, min_size: f64) -> Rect {
    let w = proposed.width().max(min_size).min(bounds.width());
    let h = proposed.height().max(min_size).min(bounds.height());
    // `x1 - w` can round below `x0` when `w` is the full width.
    let x = proposed.x0.min(bounds.x1 - w).max(bounds.x0);
    let y = proposed.y0.min(bounds.y1 - h).max(bounds.y0);
    Rect::new(x, y, (x + w).min(bounds.x1), (y + h).min(bounds.y1))
}

/// The four strips of `outer` not covered by `inner`: top, bottom, left,
/// right. `inner` is assumed to lie within `outer`.
pub fn surrounding_strips(outer: Rect, inner: Rect) -> [Rect; 4] {
    [
        Rect::new(outer.x0, outer.y0, outer.x1, inner.y0),
        Rect::new(outer.x0, inner.y1, outer.x1, outer.y1),
        Rect::new(outer.x0, inner.y0, inner.x0, inner.y1),
        Rect::new(inner.x1, inner.y0, outer.x1, inner.y1),
    ]
}

/// Rectangle of the given size centered inside `within`.
pub fn centered_in(within: Rect, width: f64, height: f64) -> Rect {
    let c = within.center();
    Rect::from_center_size(c, (width, height))
}

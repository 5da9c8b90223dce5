//! Hit testing: point → object lookup.
//!
//! Walks the scene back to front (last painted = topmost) and tests each
//! interactive object in its own local coordinate space, so rotated and
//! scaled objects are hit where they are drawn.

use annot_core::id::ObjectId;
use annot_core::model::{ObjectKind, PathCmd, Scene, SceneObject};
use kurbo::{Point, Rect};

/// Find the topmost evented object at `point` (scene coordinates).
/// `tolerance` widens thin shapes such as lines and strokes.
pub fn hit_test(scene: &Scene, point: Point, tolerance: f64) -> Option<ObjectId> {
    scene
        .iter()
        .rev()
        .filter(|o| o.evented)
        .find(|o| contains(o, point, tolerance))
        .map(|o| o.id)
}

/// All selectable objects whose bounds intersect `rect`, back to front.
/// Used for marquee (box) selection.
pub fn hit_test_rect(scene: &Scene, rect: Rect) -> Vec<ObjectId> {
    scene
        .iter()
        .filter(|o| o.selectable && o.evented)
        .filter(|o| overlaps(o.bounding_rect(), rect))
        .map(|o| o.id)
        .collect()
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

fn contains(obj: &SceneObject, point: Point, tolerance: f64) -> bool {
    let affine = obj.affine();
    if affine.determinant().abs() < f64::EPSILON {
        return false;
    }
    let local = affine.inverse() * point;
    let scale = obj
        .transform
        .scale_x
        .abs()
        .max(obj.transform.scale_y.abs())
        .max(f64::EPSILON);
    let slop = tolerance / scale + obj.style.stroke_width / 2.0;

    match &obj.kind {
        ObjectKind::Rect { .. }
        | ObjectKind::HighlightRect { .. }
        | ObjectKind::Text { .. }
        | ObjectKind::Image { .. } => obj.local_bounds().inflate(slop, slop).contains(local),
        ObjectKind::Circle { radius } => {
            local.distance(Point::new(*radius, *radius)) <= radius + slop
        }
        ObjectKind::Line { x1, y1, x2, y2 } => {
            segment_distance(local, Point::new(*x1, *y1), Point::new(*x2, *y2)) <= slop
        }
        ObjectKind::Path { commands } => path_near(commands, local, slop),
        ObjectKind::ArrowGroup { children } => {
            children.iter().any(|c| contains(c, local, tolerance / scale))
        }
    }
}

/// Strokes are hit on their polyline; quadratic segments are tested against
/// their control polygon, which is close enough for pointer picking.
fn path_near(commands: &[PathCmd], p: Point, slop: f64) -> bool {
    let mut cursor = Point::ZERO;
    let mut start = Point::ZERO;
    for cmd in commands {
        match *cmd {
            PathCmd::MoveTo(x, y) => {
                cursor = Point::new(x, y);
                start = cursor;
                if cursor.distance(p) <= slop {
                    return true;
                }
            }
            PathCmd::LineTo(x, y) => {
                let next = Point::new(x, y);
                if segment_distance(p, cursor, next) <= slop {
                    return true;
                }
                cursor = next;
            }
            PathCmd::QuadTo(cx, cy, x, y) => {
                let ctrl = Point::new(cx, cy);
                let next = Point::new(x, y);
                if segment_distance(p, cursor, ctrl) <= slop
                    || segment_distance(p, ctrl, next) <= slop
                {
                    return true;
                }
                cursor = next;
            }
            PathCmd::Close => {
                if segment_distance(p, cursor, start) <= slop {
                    return true;
                }
                cursor = start;
            }
        }
    }
    false
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.hypot2();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use annot_core::model::{ObjectStyle, Transform};
    use annot_core::Color;
    use pretty_assertions::assert_eq;

    fn rect(name: &str, left: f64, top: f64, size: f64) -> SceneObject {
        SceneObject::new(
            ObjectId::intern(name),
            ObjectKind::Rect {
                width: size,
                height: size,
            },
        )
        .at(left, top)
    }

    #[test]
    fn topmost_wins() {
        let mut scene = Scene::new();
        scene.add(rect("hit_back", 0.0, 0.0, 100.0));
        scene.add(rect("hit_front", 50.0, 50.0, 100.0));

        assert_eq!(
            hit_test(&scene, Point::new(75.0, 75.0), 0.0),
            Some(ObjectId::intern("hit_front"))
        );
        assert_eq!(
            hit_test(&scene, Point::new(10.0, 10.0), 0.0),
            Some(ObjectId::intern("hit_back"))
        );
        assert_eq!(hit_test(&scene, Point::new(400.0, 400.0), 0.0), None);
    }

    #[test]
    fn non_evented_objects_are_transparent() {
        let mut scene = Scene::new();
        scene.add(rect("hit_under", 0.0, 0.0, 100.0));
        let mut overlay = rect("hit_overlay", 0.0, 0.0, 100.0);
        overlay.set_interactive(false);
        scene.add(overlay);

        assert_eq!(
            hit_test(&scene, Point::new(20.0, 20.0), 0.0),
            Some(ObjectId::intern("hit_under"))
        );
    }

    #[test]
    fn lines_use_tolerance() {
        let mut scene = Scene::new();
        let line = SceneObject::new(
            ObjectId::intern("hit_line"),
            ObjectKind::Line {
                x1: 0.0,
                y1: 0.0,
                x2: 100.0,
                y2: 0.0,
            },
        )
        .with_style(ObjectStyle::stroked(Color::BLACK, 2.0));
        scene.add(line);

        assert_eq!(hit_test(&scene, Point::new(50.0, 8.0), 0.0), None);
        assert_eq!(
            hit_test(&scene, Point::new(50.0, 8.0), 8.0),
            Some(ObjectId::intern("hit_line"))
        );
    }

    #[test]
    fn rotated_objects_hit_where_drawn() {
        let mut scene = Scene::new();
        let mut obj = rect("hit_rotated", 100.0, 100.0, 100.0);
        obj.transform = Transform {
            angle: 90.0,
            ..obj.transform
        };
        scene.add(obj);
        // Rotating 90° clockwise about the origin swings the box to the left.
        assert_eq!(
            hit_test(&scene, Point::new(50.0, 150.0), 0.0),
            Some(ObjectId::intern("hit_rotated"))
        );
        assert_eq!(hit_test(&scene, Point::new(150.0, 150.0), 0.0), None);
    }

    #[test]
    fn marquee_collects_intersecting() {
        let mut scene = Scene::new();
        scene.add(rect("mq_a", 0.0, 0.0, 10.0));
        scene.add(rect("mq_b", 100.0, 100.0, 10.0));
        scene.add(rect("mq_c", 300.0, 300.0, 10.0));
        let hits = hit_test_rect(&scene, Rect::new(5.0, 5.0, 105.0, 105.0));
        assert_eq!(hits, vec![ObjectId::intern("mq_a"), ObjectId::intern("mq_b")]);
    }
}

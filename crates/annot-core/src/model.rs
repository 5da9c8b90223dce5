//! Scene data model for annotation canvases.
//!
//! A scene is a flat, ordered list of objects: index 0 is drawn first
//! (back-most) and the last object is on top. Every object carries a
//! transform that maps its local geometry into scene coordinates, a style,
//! and two interaction flags used by the tools and the crop session.

use crate::color::Color;
use crate::id::ObjectId;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

// ─── Transform ───────────────────────────────────────────────────────────

/// Placement of an object in the scene. `angle` is in degrees, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl Transform {
    pub fn at(left: f64, top: f64) -> Self {
        Self {
            left,
            top,
            ..Self::default()
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            ..self
        }
    }
}

// ─── Style ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectStyle {
    pub stroke: Color,
    pub stroke_width: f64,
    pub fill: Color,
    pub opacity: f64,
    /// Dash pattern as `[on, off]` lengths; `None` is a solid stroke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<[f64; 2]>,
}

impl Default for ObjectStyle {
    fn default() -> Self {
        Self {
            stroke: Color::TRANSPARENT,
            stroke_width: 1.0,
            fill: Color::TRANSPARENT,
            opacity: 1.0,
            dash: None,
        }
    }
}

impl ObjectStyle {
    /// Outline only.
    pub fn stroked(color: Color, width: f64) -> Self {
        Self {
            stroke: color,
            stroke_width: width,
            ..Self::default()
        }
    }

    /// Solid fill, no outline.
    pub fn filled(color: Color) -> Self {
        Self {
            fill: color,
            stroke_width: 0.0,
            ..Self::default()
        }
    }
}

// ─── Path data ───────────────────────────────────────────────────────────

/// A single path command in object-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCmd {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadTo(f64, f64, f64, f64),
    Close,
}

impl PathCmd {
    fn points(&self) -> impl Iterator<Item = Point> {
        let pts: [Option<Point>; 2] = match *self {
            PathCmd::MoveTo(x, y) | PathCmd::LineTo(x, y) => [Some(Point::new(x, y)), None],
            PathCmd::QuadTo(cx, cy, x, y) => [Some(Point::new(cx, cy)), Some(Point::new(x, y))],
            PathCmd::Close => [None, None],
        };
        pts.into_iter().flatten()
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        match self {
            PathCmd::MoveTo(x, y) => PathCmd::MoveTo(x + dx, y + dy),
            PathCmd::LineTo(x, y) => PathCmd::LineTo(x + dx, y + dy),
            PathCmd::QuadTo(cx, cy, x, y) => PathCmd::QuadTo(cx + dx, cy + dy, x + dx, y + dy),
            PathCmd::Close => PathCmd::Close,
        }
    }
}

/// Bounding box of every control and end point, or `None` for an empty path.
pub fn path_bounds(commands: &[PathCmd]) -> Option<Rect> {
    let mut points = commands.iter().flat_map(PathCmd::points);
    let first = points.next()?;
    Some(points.fold(Rect::from_points(first, first), |r, p| r.union_pt(p)))
}

// ─── Objects ─────────────────────────────────────────────────────────────

/// Kind-specific payload. Geometry is in object-local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectKind {
    /// Freehand stroke or arrowhead.
    Path { commands: Vec<PathCmd> },
    Rect { width: f64, height: f64 },
    /// Local box is `2r × 2r`; the center sits at `(r, r)`.
    Circle { radius: f64 },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Shaft plus arrowhead. Child transforms are relative to the group.
    ArrowGroup { children: Vec<SceneObject> },
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        font_family: String,
        font_size: f64,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        src: String,
        natural_width: u32,
        natural_height: u32,
    },
    HighlightRect { width: f64, height: f64 },
}

impl ObjectKind {
    /// Name used as the prefix for fresh IDs.
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Path { .. } => "path",
            ObjectKind::Rect { .. } => "rect",
            ObjectKind::Circle { .. } => "circle",
            ObjectKind::Line { .. } => "line",
            ObjectKind::ArrowGroup { .. } => "arrow",
            ObjectKind::Text { .. } => "text",
            ObjectKind::Image { .. } => "image",
            ObjectKind::HighlightRect { .. } => "highlight",
        }
    }
}

/// Average glyph advance as a fraction of the font size. Only used for
/// hit-testing and bounds, which do not depend on a loaded font.
const GLYPH_ADVANCE: f64 = 0.6;
/// Line pitch as a fraction of the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.16;

fn is_false(v: &bool) -> bool {
    !*v
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    #[serde(default = "ObjectId::anonymous")]
    pub id: ObjectId,
    pub kind: ObjectKind,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub style: ObjectStyle,
    #[serde(default = "default_true")]
    pub selectable: bool,
    #[serde(default = "default_true")]
    pub evented: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclude_from_export: bool,
}

impl SceneObject {
    pub fn new(id: ObjectId, kind: ObjectKind) -> Self {
        Self {
            id,
            kind,
            transform: Transform::default(),
            style: ObjectStyle::default(),
            selectable: true,
            evented: true,
            exclude_from_export: false,
        }
    }

    /// New object with a freshly minted ID derived from its kind.
    pub fn fresh(kind: ObjectKind) -> Self {
        Self::new(ObjectId::fresh(kind.type_name()), kind)
    }

    pub fn at(mut self, left: f64, top: f64) -> Self {
        self.transform.left = left;
        self.transform.top = top;
        self
    }

    pub fn with_style(mut self, style: ObjectStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ObjectKind::Image { .. })
    }

    pub fn image_src(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Image { src, .. } => Some(src),
            _ => None,
        }
    }

    pub fn set_interactive(&mut self, on: bool) {
        self.selectable = on;
        self.evented = on;
    }

    /// Bounding box of the geometry in local coordinates.
    pub fn local_bounds(&self) -> Rect {
        match &self.kind {
            ObjectKind::Path { commands } => path_bounds(commands).unwrap_or(Rect::ZERO),
            ObjectKind::Rect { width, height } | ObjectKind::HighlightRect { width, height } => {
                Rect::new(0.0, 0.0, *width, *height)
            }
            ObjectKind::Circle { radius } => Rect::new(0.0, 0.0, radius * 2.0, radius * 2.0),
            ObjectKind::Line { x1, y1, x2, y2 } => {
                Rect::from_points(Point::new(*x1, *y1), Point::new(*x2, *y2))
            }
            ObjectKind::ArrowGroup { children } => children
                .iter()
                .map(SceneObject::bounding_rect)
                .reduce(|a, b| a.union(b))
                .unwrap_or(Rect::ZERO),
            ObjectKind::Text {
                text,
                font_size,
                ..
            } => {
                let lines = text.lines().count().max(1) as f64;
                let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0) as f64;
                Rect::new(
                    0.0,
                    0.0,
                    widest * font_size * GLYPH_ADVANCE,
                    lines * font_size * TEXT_LINE_HEIGHT,
                )
            }
            ObjectKind::Image {
                natural_width,
                natural_height,
                ..
            } => Rect::new(0.0, 0.0, f64::from(*natural_width), f64::from(*natural_height)),
        }
    }

    /// Local → scene transform: translate, rotate, scale, then flip about
    /// the local box center.
    pub fn affine(&self) -> Affine {
        let t = &self.transform;
        let center = self.local_bounds().center().to_vec2();
        let flip = Affine::translate(center)
            * Affine::scale_non_uniform(
                if t.flip_x { -1.0 } else { 1.0 },
                if t.flip_y { -1.0 } else { 1.0 },
            )
            * Affine::translate(-center);
        Affine::translate(Vec2::new(t.left, t.top))
            * Affine::rotate(t.angle.to_radians())
            * Affine::scale_non_uniform(t.scale_x, t.scale_y)
            * flip
    }

    /// Axis-aligned bounds in scene coordinates.
    pub fn bounding_rect(&self) -> Rect {
        self.affine().transform_rect_bbox(self.local_bounds())
    }

    /// On-screen size at zoom 1 (local size × scale).
    pub fn rendered_size(&self) -> Size {
        let local = self.local_bounds();
        Size::new(
            local.width() * self.transform.scale_x.abs(),
            local.height() * self.transform.scale_y.abs(),
        )
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.transform = self.transform.translated(dx, dy);
    }

    /// Fit an unrotated object to `bounds` by adjusting position and scale.
    pub fn set_bounds(&mut self, bounds: Rect) {
        let local = self.local_bounds();
        if local.width() > 0.0 {
            self.transform.scale_x = bounds.width() / local.width();
        }
        if local.height() > 0.0 {
            self.transform.scale_y = bounds.height() / local.height();
        }
        let current = self.bounding_rect();
        self.translate(bounds.x0 - current.x0, bounds.y0 - current.y0);
    }

    /// Deep copy with new IDs for the object and any children.
    pub fn with_fresh_ids(&self) -> Self {
        let mut copy = self.clone();
        copy.id = ObjectId::fresh(copy.kind.type_name());
        if let ObjectKind::ArrowGroup { children } = &mut copy.kind {
            for child in children.iter_mut() {
                *child = child.with_fresh_ids();
            }
        }
        copy
    }
}

// ─── Scene ───────────────────────────────────────────────────────────────

/// Ordered object list plus background. Index is z-order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub background: Color,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            background: Color::WHITE,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SceneObject> {
        self.objects.iter()
    }

    /// Objects that belong in saved documents and exports.
    pub fn exportable(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| !o.exclude_from_export)
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index_of(id).is_some()
    }

    /// Add on top of the stack.
    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = object.id;
        self.objects.push(object);
        id
    }

    /// Insert at a z-index, clamped to the stack size.
    pub fn insert_at(&mut self, index: usize, object: SceneObject) -> ObjectId {
        let id = object.id;
        let index = index.min(self.objects.len());
        self.objects.insert(index, object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let idx = self.index_of(id)?;
        Some(self.objects.remove(idx))
    }

    /// Swap in `object` at the z-index of `id`, returning the old object.
    pub fn replace(&mut self, id: ObjectId, object: SceneObject) -> Option<SceneObject> {
        let idx = self.index_of(id)?;
        Some(std::mem::replace(&mut self.objects[idx], object))
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Move an object one step backward in z-order.
    /// Returns true if the z-order changed.
    pub fn send_backward(&mut self, id: ObjectId) -> bool {
        match self.index_of(id) {
            Some(pos) if pos > 0 => self.reorder(pos, pos - 1),
            _ => false,
        }
    }

    /// Move an object one step forward in z-order.
    pub fn bring_forward(&mut self, id: ObjectId) -> bool {
        match self.index_of(id) {
            Some(pos) if pos + 1 < self.objects.len() => self.reorder(pos, pos + 1),
            _ => false,
        }
    }

    /// Move an object to the back of z-order.
    pub fn send_to_back(&mut self, id: ObjectId) -> bool {
        match self.index_of(id) {
            Some(pos) if pos > 0 => self.reorder(pos, 0),
            _ => false,
        }
    }

    /// Move an object to the front of z-order.
    pub fn bring_to_front(&mut self, id: ObjectId) -> bool {
        let last = self.objects.len().saturating_sub(1);
        match self.index_of(id) {
            Some(pos) if pos < last => self.reorder(pos, last),
            _ => false,
        }
    }

    fn reorder(&mut self, from: usize, to: usize) -> bool {
        let object = self.objects.remove(from);
        self.objects.insert(to, object);
        true
    }
}

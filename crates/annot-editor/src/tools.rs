//! Tool system for canvas interactions.
//!
//! Each tool translates pointer events into [`SceneMutation`]s that the
//! session applies. Tools see the world only through the [`ToolContext`]
//! the session builds for every event: the live brush settings, what lies
//! under the pointer and the current selection.
//!
//! ## Gestures
//!
//! | Tool | Down | Move | Up |
//! |------|------|------|----|
//! | **Select** | select / start drag or marquee | move, resize or grow marquee | commit marquee |
//! | **Draw** | start stroke | collect point | add smoothed stroke |
//! | **Text** | place text | - | - |
//! | **Shapes** | add placeholder | reshape | finalize, back to select |
//! | **Image** | ask host for a file | - | - |

use crate::input::InputEvent;
use crate::mutation::SceneMutation;
use crate::settings::ToolSettings;
use annot_core::geometry::{
    arrowhead_shape, circle_from_drag, line_shape, normalize_rect, normalized_path, smooth_stroke,
};
use annot_core::id::ObjectId;
use annot_core::model::{ObjectKind, ObjectStyle, SceneObject};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Highlighter fill opacity.
pub const HIGHLIGHT_OPACITY: f64 = 0.3;

/// The active tool determines how pointer events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Draw,
    Text,
    Rect,
    Circle,
    Line,
    Arrow,
    Highlight,
    Image,
}

impl ToolKind {
    pub fn shape(&self) -> Option<ShapeKind> {
        match self {
            ToolKind::Rect => Some(ShapeKind::Rect),
            ToolKind::Circle => Some(ShapeKind::Circle),
            ToolKind::Line => Some(ShapeKind::Line),
            ToolKind::Arrow => Some(ShapeKind::Arrow),
            ToolKind::Highlight => Some(ShapeKind::Highlight),
            _ => None,
        }
    }

    /// Tools that place new objects and therefore yield to selection when
    /// the pointer lands on something that already exists.
    pub fn yields_to_select(&self) -> bool {
        matches!(self, ToolKind::Text) || self.shape().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Rect,
    Circle,
    Line,
    Arrow,
    Highlight,
}

/// A grabbed corner of a selected object. The anchor is the opposite
/// corner, which stays put while the object is resized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeHandle {
    pub id: ObjectId,
    pub anchor: Point,
}

impl ResizeHandle {
    /// The handle under `point`, if it is within `tolerance` of a corner of
    /// an unrotated object.
    pub fn find(obj: &SceneObject, point: Point, tolerance: f64) -> Option<Self> {
        if obj.transform.angle.rem_euclid(360.0) != 0.0 || !obj.selectable {
            return None;
        }
        let b = obj.bounding_rect();
        let corners = [
            (Point::new(b.x0, b.y0), Point::new(b.x1, b.y1)),
            (Point::new(b.x1, b.y0), Point::new(b.x0, b.y1)),
            (Point::new(b.x0, b.y1), Point::new(b.x1, b.y0)),
            (Point::new(b.x1, b.y1), Point::new(b.x0, b.y0)),
        ];
        corners
            .into_iter()
            .find(|(corner, _)| corner.distance(point) <= tolerance)
            .map(|(_, anchor)| Self { id: obj.id, anchor })
    }
}

/// Everything a tool may consult while handling one event.
pub struct ToolContext<'a> {
    pub settings: &'a ToolSettings,
    /// Topmost evented object under the pointer.
    pub hit: Option<ObjectId>,
    /// Resize handle under the pointer, if any.
    pub handle: Option<ResizeHandle>,
    pub selection: &'a [ObjectId],
    pub text_placeholder: &'a str,
}

/// What a tool asks the session to do in response to an event.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ToolOutput {
    pub mutations: Vec<SceneMutation>,
    /// Replace the selection.
    pub select: Option<Vec<ObjectId>>,
    /// Current marquee rectangle; committed by the session on pointer-up.
    pub marquee: Option<Rect>,
    /// The gesture completed something; fall back to the select tool.
    pub finished: bool,
    /// Ask the host to pick an image file.
    pub request_image: bool,
    /// Start editing this text object.
    pub edit_text: Option<ObjectId>,
}

impl ToolOutput {
    fn mutations(mutations: Vec<SceneMutation>) -> Self {
        Self {
            mutations,
            ..Self::default()
        }
    }
}

/// Trait for tools that handle input and produce mutations.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    fn handle(&mut self, event: &InputEvent, ctx: &ToolContext) -> ToolOutput;

    /// Drop any gesture in progress.
    fn reset(&mut self) {}
}

// ─── Select Tool ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Drag {
    Idle,
    Moving { ids: Vec<ObjectId>, last: Point },
    Resizing(ResizeHandle),
    Marquee { start: Point, rect: Rect },
}

pub struct SelectTool {
    drag: Drag,
}

impl Default for SelectTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectTool {
    pub fn new() -> Self {
        Self { drag: Drag::Idle }
    }

    /// Marquee rectangle while one is being dragged.
    pub fn marquee(&self) -> Option<Rect> {
        match self.drag {
            Drag::Marquee { rect, .. } => Some(rect),
            _ => None,
        }
    }
}

impl Tool for SelectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Select
    }

    fn handle(&mut self, event: &InputEvent, ctx: &ToolContext) -> ToolOutput {
        let p = event.point();
        match event {
            InputEvent::PointerDown { modifiers, .. } => {
                if let Some(handle) = ctx.handle.filter(|_| !modifiers.shift) {
                    self.drag = Drag::Resizing(handle);
                    return ToolOutput {
                        select: Some(vec![handle.id]),
                        ..ToolOutput::default()
                    };
                }

                let Some(hit) = ctx.hit else {
                    // Empty space: start a marquee
                    self.drag = Drag::Marquee {
                        start: p,
                        rect: Rect::from_points(p, p),
                    };
                    let select = (!modifiers.shift).then(Vec::new);
                    return ToolOutput {
                        select,
                        marquee: Some(Rect::from_points(p, p)),
                        ..ToolOutput::default()
                    };
                };

                let mut selection = ctx.selection.to_vec();
                if modifiers.shift {
                    if let Some(pos) = selection.iter().position(|id| *id == hit) {
                        selection.remove(pos);
                    } else {
                        selection.push(hit);
                    }
                } else if !selection.contains(&hit) {
                    selection = vec![hit];
                }
                // Clicking an already-selected object keeps the selection for the drag

                self.drag = Drag::Moving {
                    ids: selection.clone(),
                    last: p,
                };
                ToolOutput {
                    select: Some(selection),
                    ..ToolOutput::default()
                }
            }
            InputEvent::PointerMove { modifiers, .. } => match &mut self.drag {
                Drag::Idle => ToolOutput::default(),
                Drag::Moving { ids, last } => {
                    let mut dx = p.x - last.x;
                    let mut dy = p.y - last.y;
                    *last = p;
                    // Shift: constrain to dominant axis
                    if modifiers.shift {
                        if dx.abs() > dy.abs() {
                            dy = 0.0;
                        } else {
                            dx = 0.0;
                        }
                    }
                    if dx == 0.0 && dy == 0.0 {
                        return ToolOutput::default();
                    }
                    ToolOutput::mutations(
                        ids.iter()
                            .map(|id| SceneMutation::Move { id: *id, dx, dy })
                            .collect(),
                    )
                }
                Drag::Resizing(handle) => {
                    let mut bounds = Rect::from_points(handle.anchor, p);
                    if bounds.width() < 1.0 || bounds.height() < 1.0 {
                        bounds = bounds.with_size((bounds.width().max(1.0), bounds.height().max(1.0)));
                    }
                    ToolOutput::mutations(vec![SceneMutation::SetBounds {
                        id: handle.id,
                        bounds,
                    }])
                }
                Drag::Marquee { start, rect } => {
                    *rect = normalize_rect(*start, p);
                    ToolOutput {
                        marquee: Some(*rect),
                        ..ToolOutput::default()
                    }
                }
            },
            InputEvent::PointerUp { .. } => {
                let marquee = self.marquee();
                self.drag = Drag::Idle;
                ToolOutput {
                    marquee,
                    ..ToolOutput::default()
                }
            }
        }
    }

    fn reset(&mut self) {
        self.drag = Drag::Idle;
    }
}

// ─── Draw Tool (freehand) ────────────────────────────────────────────────

pub struct DrawTool {
    points: Vec<Point>,
    style: ObjectStyle,
}

impl Default for DrawTool {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawTool {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            style: ObjectStyle::default(),
        }
    }

    fn stroke(&self, style: ObjectStyle) -> Option<SceneObject> {
        if self.points.is_empty() {
            return None;
        }
        let (origin, kind) = normalized_path(smooth_stroke(&self.points));
        Some(SceneObject::fresh(kind).at(origin.x, origin.y).with_style(style))
    }

    /// The stroke being drawn, for live rendering. Not part of the scene.
    pub fn preview(&self) -> Option<SceneObject> {
        if self.points.len() < 2 {
            return None;
        }
        let (origin, kind) = normalized_path(smooth_stroke(&self.points));
        Some(
            SceneObject::new(ObjectId::intern("__stroke_preview"), kind)
                .at(origin.x, origin.y)
                .with_style(self.style),
        )
    }
}

fn brush(settings: &ToolSettings) -> ObjectStyle {
    ObjectStyle::stroked(settings.drawing_color, settings.drawing_width)
}

impl Tool for DrawTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Draw
    }

    fn handle(&mut self, event: &InputEvent, ctx: &ToolContext) -> ToolOutput {
        let p = event.point();
        self.style = brush(ctx.settings);
        match event {
            InputEvent::PointerDown { .. } => {
                self.points.clear();
                self.points.push(p);
                ToolOutput::default()
            }
            InputEvent::PointerMove { .. } => {
                if !self.points.is_empty() {
                    self.points.push(p);
                }
                ToolOutput::default()
            }
            InputEvent::PointerUp { .. } => {
                if self.points.last() != Some(&p) && !self.points.is_empty() {
                    self.points.push(p);
                }
                // Restyled with the brush as it is now, not as it was at pointer-down
                let stroke = self.stroke(brush(ctx.settings));
                self.points.clear();
                match stroke {
                    Some(object) => ToolOutput::mutations(vec![SceneMutation::CompleteStroke {
                        object: Box::new(object),
                    }]),
                    None => ToolOutput::default(),
                }
            }
        }
    }

    fn reset(&mut self) {
        self.points.clear();
    }
}

// ─── Text Tool ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct TextTool;

impl Tool for TextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Text
    }

    fn handle(&mut self, event: &InputEvent, ctx: &ToolContext) -> ToolOutput {
        let InputEvent::PointerDown { .. } = event else {
            return ToolOutput::default();
        };
        let p = event.point();
        let settings = ctx.settings;
        let text = SceneObject::fresh(ObjectKind::Text {
            text: ctx.text_placeholder.to_string(),
            font_family: settings.font_family.clone(),
            font_size: settings.font_size,
        })
        .at(p.x, p.y)
        .with_style(ObjectStyle::filled(settings.drawing_color));
        let id = text.id;
        ToolOutput {
            mutations: vec![SceneMutation::Add {
                object: Box::new(text),
            }],
            select: Some(vec![id]),
            finished: true,
            edit_text: Some(id),
            ..ToolOutput::default()
        }
    }
}

// ─── Shape Tool ──────────────────────────────────────────────────────────

/// Rect, circle, line, arrow and highlight all share one drag-to-size
/// state machine.
pub struct ShapeTool {
    shape: ShapeKind,
    anchor: Point,
    current: Option<ObjectId>,
}

impl ShapeTool {
    pub fn new(shape: ShapeKind) -> Self {
        Self {
            shape,
            anchor: Point::ZERO,
            current: None,
        }
    }

    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    pub fn set_shape(&mut self, shape: ShapeKind) {
        if self.shape != shape {
            self.shape = shape;
            self.current = None;
        }
    }

    fn style(&self, settings: &ToolSettings) -> ObjectStyle {
        match self.shape {
            ShapeKind::Highlight => ObjectStyle {
                opacity: HIGHLIGHT_OPACITY,
                ..ObjectStyle::filled(settings.drawing_color)
            },
            _ => brush(settings),
        }
    }
}

/// Local geometry and scene origin for a drag from `a` to `b`.
pub fn shape_geometry(shape: ShapeKind, a: Point, b: Point) -> (Point, ObjectKind) {
    match shape {
        ShapeKind::Rect | ShapeKind::Highlight => {
            let r = normalize_rect(a, b);
            let (width, height) = (r.width(), r.height());
            let kind = if shape == ShapeKind::Rect {
                ObjectKind::Rect { width, height }
            } else {
                ObjectKind::HighlightRect { width, height }
            };
            (r.origin(), kind)
        }
        ShapeKind::Circle => {
            let (center, radius) = circle_from_drag(a, b);
            (
                Point::new(center.x - radius, center.y - radius),
                ObjectKind::Circle { radius },
            )
        }
        ShapeKind::Line | ShapeKind::Arrow => line_shape(a, b),
    }
}

/// Shaft plus arrowhead grouped into one object. Child positions are
/// relative to the group origin.
pub fn arrow_group(start: Point, end: Point, style: ObjectStyle) -> SceneObject {
    let (shaft_at, shaft) = line_shape(start, end);
    let (head_at, head) = arrowhead_shape(start, end, style.stroke_width);
    let origin = Point::new(shaft_at.x.min(head_at.x), shaft_at.y.min(head_at.y));

    let child = |at: Point, kind: ObjectKind| {
        SceneObject::fresh(kind)
            .at(at.x - origin.x, at.y - origin.y)
            .with_style(style)
    };
    let children = vec![child(shaft_at, shaft), child(head_at, head)];
    SceneObject::fresh(ObjectKind::ArrowGroup { children })
        .at(origin.x, origin.y)
}

impl Tool for ShapeTool {
    fn kind(&self) -> ToolKind {
        match self.shape {
            ShapeKind::Rect => ToolKind::Rect,
            ShapeKind::Circle => ToolKind::Circle,
            ShapeKind::Line => ToolKind::Line,
            ShapeKind::Arrow => ToolKind::Arrow,
            ShapeKind::Highlight => ToolKind::Highlight,
        }
    }

    fn handle(&mut self, event: &InputEvent, ctx: &ToolContext) -> ToolOutput {
        let p = event.point();
        match event {
            InputEvent::PointerDown { .. } => {
                self.anchor = p;
                let (origin, kind) = shape_geometry(self.shape, p, p);
                let mut placeholder = SceneObject::fresh(kind)
                    .at(origin.x, origin.y)
                    .with_style(self.style(ctx.settings));
                placeholder.set_interactive(false);
                self.current = Some(placeholder.id);
                ToolOutput::mutations(vec![SceneMutation::Add {
                    object: Box::new(placeholder),
                }])
            }
            InputEvent::PointerMove { .. } => {
                let Some(id) = self.current else {
                    return ToolOutput::default();
                };
                let (origin, kind) = shape_geometry(self.shape, self.anchor, p);
                ToolOutput::mutations(vec![SceneMutation::Reshape { id, origin, kind }])
            }
            InputEvent::PointerUp { .. } => {
                let Some(id) = self.current.take() else {
                    return ToolOutput::default();
                };
                let (mutations, selected) = if self.shape == ShapeKind::Arrow {
                    let group = arrow_group(self.anchor, p, self.style(ctx.settings));
                    let group_id = group.id;
                    (
                        vec![
                            SceneMutation::Remove { id },
                            SceneMutation::Add {
                                object: Box::new(group),
                            },
                        ],
                        group_id,
                    )
                } else {
                    let (origin, kind) = shape_geometry(self.shape, self.anchor, p);
                    (
                        vec![
                            SceneMutation::Reshape { id, origin, kind },
                            SceneMutation::Finalize { id },
                        ],
                        id,
                    )
                };
                ToolOutput {
                    mutations,
                    select: Some(vec![selected]),
                    finished: true,
                    ..ToolOutput::default()
                }
            }
        }
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

// ─── Image Tool ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ImageTool;

impl Tool for ImageTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Image
    }

    fn handle(&mut self, event: &InputEvent, _ctx: &ToolContext) -> ToolOutput {
        match event {
            InputEvent::PointerDown { .. } => ToolOutput {
                request_image: true,
                ..ToolOutput::default()
            },
            _ => ToolOutput::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use annot_core::Color;
    use pretty_assertions::assert_eq;

    fn ctx<'a>(settings: &'a ToolSettings, selection: &'a [ObjectId]) -> ToolContext<'a> {
        ToolContext {
            settings,
            hit: None,
            handle: None,
            selection,
            text_placeholder: "Click to edit",
        }
    }

    fn down(x: f64, y: f64) -> InputEvent {
        InputEvent::PointerDown {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    fn mv(x: f64, y: f64) -> InputEvent {
        InputEvent::PointerMove {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    fn up(x: f64, y: f64) -> InputEvent {
        InputEvent::PointerUp {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    #[test]
    fn select_tool_shift_toggles() {
        let settings = ToolSettings::default();
        let a = ObjectId::intern("sel_a");
        let b = ObjectId::intern("sel_b");
        let selection = [a];
        let mut tool = SelectTool::new();
        let mut c = ctx(&settings, &selection);
        c.hit = Some(b);
        let out = tool.handle(
            &InputEvent::PointerDown {
                x: 0.0,
                y: 0.0,
                modifiers: Modifiers {
                    shift: true,
                    ..Modifiers::NONE
                },
            },
            &c,
        );
        assert_eq!(out.select, Some(vec![a, b]));
    }

    #[test]
    fn select_tool_drags_selection() {
        let settings = ToolSettings::default();
        let a = ObjectId::intern("drag_a");
        let mut tool = SelectTool::new();
        let mut c = ctx(&settings, &[]);
        c.hit = Some(a);
        assert_eq!(tool.handle(&down(10.0, 10.0), &c).select, Some(vec![a]));
        let out = tool.handle(&mv(15.0, 7.0), &c);
        assert_eq!(
            out.mutations,
            vec![SceneMutation::Move {
                id: a,
                dx: 5.0,
                dy: -3.0
            }]
        );
        assert!(tool.handle(&up(15.0, 7.0), &c).mutations.is_empty());
    }

    #[test]
    fn select_tool_marquee() {
        let settings = ToolSettings::default();
        let mut tool = SelectTool::new();
        let c = ctx(&settings, &[]);
        let out = tool.handle(&down(50.0, 50.0), &c);
        assert_eq!(out.select, Some(vec![]));
        tool.handle(&mv(10.0, 90.0), &c);
        assert_eq!(tool.marquee(), Some(Rect::new(10.0, 50.0, 50.0, 90.0)));
        let out = tool.handle(&up(10.0, 90.0), &c);
        assert_eq!(out.marquee, Some(Rect::new(10.0, 50.0, 50.0, 90.0)));
        assert_eq!(tool.marquee(), None);
    }

    #[test]
    fn resize_handle_keeps_opposite_corner() {
        let obj = SceneObject::new(
            ObjectId::intern("resize_me"),
            ObjectKind::Rect {
                width: 100.0,
                height: 50.0,
            },
        )
        .at(10.0, 10.0);
        let handle = ResizeHandle::find(&obj, Point::new(108.0, 61.0), 4.0).unwrap();
        assert_eq!(handle.anchor, Point::new(10.0, 10.0));
        assert!(ResizeHandle::find(&obj, Point::new(60.0, 30.0), 4.0).is_none());

        let settings = ToolSettings::default();
        let mut c = ctx(&settings, &[]);
        c.handle = Some(handle);
        let mut tool = SelectTool::new();
        tool.handle(&down(110.0, 60.0), &c);
        let out = tool.handle(&mv(210.0, 110.0), &c);
        assert_eq!(
            out.mutations,
            vec![SceneMutation::SetBounds {
                id: obj.id,
                bounds: Rect::new(10.0, 10.0, 210.0, 110.0)
            }]
        );
    }

    #[test]
    fn rect_gesture() {
        let settings = ToolSettings::default();
        let c = ctx(&settings, &[]);
        let mut tool = ShapeTool::new(ShapeKind::Rect);

        let out = tool.handle(&down(100.0, 100.0), &c);
        let id = match &out.mutations[..] {
            [SceneMutation::Add { object }] => {
                assert!(!object.selectable && !object.evented);
                assert_eq!(object.style.stroke, Color::BLACK);
                assert_eq!(object.style.stroke_width, 2.0);
                object.id
            }
            _ => panic!("expected Add"),
        };

        tool.handle(&mv(160.0, 140.0), &c);
        let out = tool.handle(&up(200.0, 180.0), &c);
        assert!(out.finished);
        assert_eq!(out.select, Some(vec![id]));
        assert_eq!(
            out.mutations,
            vec![
                SceneMutation::Reshape {
                    id,
                    origin: Point::new(100.0, 100.0),
                    kind: ObjectKind::Rect {
                        width: 100.0,
                        height: 80.0
                    }
                },
                SceneMutation::Finalize { id },
            ]
        );
    }

    #[test]
    fn circle_from_reverse_drag() {
        let (origin, kind) =
            shape_geometry(ShapeKind::Circle, Point::new(60.0, 80.0), Point::new(0.0, 0.0));
        assert_eq!(kind, ObjectKind::Circle { radius: 50.0 });
        assert_eq!(origin, Point::new(-20.0, -10.0));
    }

    #[test]
    fn arrow_gesture_groups_shaft_and_head() {
        let settings = ToolSettings::default();
        let c = ctx(&settings, &[]);
        let mut tool = ShapeTool::new(ShapeKind::Arrow);
        tool.handle(&down(0.0, 0.0), &c);
        tool.handle(&mv(50.0, 0.0), &c);
        let out = tool.handle(&up(100.0, 0.0), &c);
        match &out.mutations[..] {
            [SceneMutation::Remove { .. }, SceneMutation::Add { object }] => {
                let ObjectKind::ArrowGroup { children } = &object.kind else {
                    panic!("expected ArrowGroup");
                };
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].kind.type_name(), "line");
                assert_eq!(children[1].kind.type_name(), "path");
                assert_eq!(out.select, Some(vec![object.id]));
                let b = object.bounding_rect();
                assert!((b.width() - 100.0).abs() < 1e-9);
            }
            _ => panic!("expected Remove + Add"),
        }
    }

    #[test]
    fn highlight_is_translucent_fill() {
        let settings = ToolSettings {
            drawing_color: Color::YELLOW,
            ..ToolSettings::default()
        };
        let tool = ShapeTool::new(ShapeKind::Highlight);
        let style = tool.style(&settings);
        assert_eq!(style.fill, Color::YELLOW);
        assert_eq!(style.opacity, HIGHLIGHT_OPACITY);
        assert_eq!(style.stroke_width, 0.0);
    }

    #[test]
    fn draw_uses_live_brush() {
        let mut settings = ToolSettings::default();
        let mut tool = DrawTool::new();
        tool.handle(&down(0.0, 0.0), &ctx(&settings, &[]));
        tool.handle(&mv(10.0, 5.0), &ctx(&settings, &[]));
        assert!(tool.preview().is_some());

        settings.drawing_color = Color::from_hex("#ff0000").unwrap();
        settings.drawing_width = 8.0;
        let out = tool.handle(&up(20.0, 10.0), &ctx(&settings, &[]));
        match &out.mutations[..] {
            [SceneMutation::CompleteStroke { object }] => {
                assert_eq!(object.style.stroke.to_hex(), "#ff0000");
                assert_eq!(object.style.stroke_width, 8.0);
                assert_eq!(object.transform.origin(), Point::new(0.0, 0.0));
            }
            _ => panic!("expected CompleteStroke"),
        }
        assert!(!out.finished);
        assert!(tool.preview().is_none());
    }

    #[test]
    fn text_placement() {
        let settings = ToolSettings::default();
        let mut tool = TextTool;
        let out = tool.handle(&down(40.0, 60.0), &ctx(&settings, &[]));
        assert!(out.finished);
        match &out.mutations[..] {
            [SceneMutation::Add { object }] => {
                let ObjectKind::Text {
                    text, font_size, ..
                } = &object.kind
                else {
                    panic!("expected Text");
                };
                assert_eq!(text, "Click to edit");
                assert_eq!(*font_size, 20.0);
                assert_eq!(out.edit_text, Some(object.id));
            }
            _ => panic!("expected Add"),
        }
    }
}

//! Scene → pixels.
//!
//! A small CPU painter on tiny-skia. It backs whole-scene export, the
//! oversized-document fallback, pixel extraction for the clipboard and the
//! host preview surface. Text is filled from glyph outlines when a face is
//! registered in the [`FontBook`]; without one, text objects are skipped.

use crate::error::RenderError;
use crate::pixels::ImageCache;
use crate::text::{glyph_path, FontBook};
use annot_core::model::{ObjectKind, ObjectStyle, PathCmd, Scene, SceneObject};
use annot_core::viewport::ViewportTransform;
use annot_core::Color;
use image::RgbaImage;
use kurbo::{Affine, Rect};
use tiny_skia::{
    FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash,
    Transform,
};

/// Largest surface edge we are willing to allocate.
pub const MAX_SURFACE_EDGE: u32 = 8192;

/// Union of the bounds of every exportable object.
pub fn content_bounds(scene: &Scene) -> Option<Rect> {
    scene
        .exportable()
        .map(SceneObject::bounding_rect)
        .reduce(|a, b| a.union(b))
}

/// Largest multiplier, up to `preferred`, at which `region` fits on a
/// surface.
pub fn fit_multiplier(region: Rect, preferred: f64) -> f64 {
    let longest = region.width().max(region.height());
    if longest <= 0.0 {
        return preferred;
    }
    // One pixel of headroom for the `ceil` in `render_region`.
    preferred.min(f64::from(MAX_SURFACE_EDGE - 1) / longest)
}

/// Render the exportable objects inside `region` (scene units) at
/// `multiplier` pixels per unit, over the scene background.
pub fn render_region(
    scene: &Scene,
    images: &ImageCache,
    fonts: &FontBook,
    region: Rect,
    multiplier: f64,
) -> Result<RgbaImage, RenderError> {
    let width = (region.width() * multiplier).ceil().max(1.0) as u32;
    let height = (region.height() * multiplier).ceil().max(1.0) as u32;
    let mut pixmap = surface(width, height)?;
    fill_background(&mut pixmap, scene.background);

    let base = Affine::scale(multiplier) * Affine::translate(-region.origin().to_vec2());
    let assets = Assets { images, fonts: Some(fonts) };
    for obj in scene.exportable() {
        paint_object(&mut pixmap, obj, base, &assets);
    }
    Ok(to_rgba(&pixmap))
}

/// Render what the user sees: every object (crop guides included) plus any
/// transient `extra` objects such as an in-progress stroke. Pass no fonts
/// when the host draws text itself.
pub fn render_view(
    scene: &Scene,
    images: &ImageCache,
    fonts: Option<&FontBook>,
    viewport: &ViewportTransform,
    width: u32,
    height: u32,
    extra: &[SceneObject],
) -> Result<RgbaImage, RenderError> {
    let mut pixmap = surface(width, height)?;
    fill_background(&mut pixmap, scene.background);
    let base = viewport.affine();
    let assets = Assets { images, fonts };
    for obj in scene.iter().chain(extra) {
        paint_object(&mut pixmap, obj, base, &assets);
    }
    Ok(to_rgba(&pixmap))
}

fn surface(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    if width > MAX_SURFACE_EDGE || height > MAX_SURFACE_EDGE {
        return Err(RenderError::Surface { width, height });
    }
    Pixmap::new(width, height).ok_or(RenderError::Surface { width, height })
}

fn fill_background(pixmap: &mut Pixmap, color: Color) {
    let [r, g, b, a] = color.to_rgba8();
    pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
}

fn to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    out
}

fn to_transform(a: Affine) -> Transform {
    let [sx, ky, kx, sy, tx, ty] = a.as_coeffs();
    Transform::from_row(
        sx as f32, ky as f32, kx as f32, sy as f32, tx as f32, ty as f32,
    )
}

// ─── Object painters ─────────────────────────────────────────────────────

struct Assets<'a> {
    images: &'a ImageCache,
    fonts: Option<&'a FontBook>,
}

fn paint_object(pixmap: &mut Pixmap, obj: &SceneObject, parent: Affine, assets: &Assets) {
    let affine = parent * obj.affine();
    let ts = to_transform(affine);

    match &obj.kind {
        ObjectKind::Rect { width, height } | ObjectKind::HighlightRect { width, height } => {
            if let Some(rect) = tiny_skia::Rect::from_xywh(0.0, 0.0, *width as f32, *height as f32)
            {
                paint_shape(pixmap, &PathBuilder::from_rect(rect), &obj.style, ts);
            }
        }
        ObjectKind::Circle { radius } => {
            let r = *radius as f32;
            if let Some(path) = PathBuilder::from_circle(r, r, r) {
                paint_shape(pixmap, &path, &obj.style, ts);
            }
        }
        ObjectKind::Line { x1, y1, x2, y2 } => {
            let mut pb = PathBuilder::new();
            pb.move_to(*x1 as f32, *y1 as f32);
            pb.line_to(*x2 as f32, *y2 as f32);
            if let Some(path) = pb.finish() {
                paint_shape(pixmap, &path, &obj.style, ts);
            }
        }
        ObjectKind::Path { commands } => {
            if let Some(path) = build_path(commands) {
                paint_shape(pixmap, &path, &obj.style, ts);
            }
        }
        ObjectKind::ArrowGroup { children } => {
            for child in children {
                paint_object(pixmap, child, affine, assets);
            }
        }
        ObjectKind::Text {
            text,
            font_family,
            font_size,
        } => {
            let Some(fonts) = assets.fonts else {
                return;
            };
            let Some(font) = fonts.resolve(font_family) else {
                log::trace!("no font for text {}", obj.id);
                return;
            };
            if let Some(path) = glyph_path(font, text, *font_size) {
                let opacity = obj.style.opacity.clamp(0.0, 1.0) as f32;
                let paint = solid(obj.style.fill.with_opacity(opacity));
                pixmap.fill_path(&path, &paint, FillRule::Winding, ts, None);
            }
        }
        ObjectKind::Image { src, .. } => match assets.images.get(src) {
            Some(decoded) => {
                let paint = PixmapPaint {
                    opacity: obj.style.opacity.clamp(0.0, 1.0) as f32,
                    ..PixmapPaint::default()
                };
                pixmap.draw_pixmap(0, 0, decoded.pixmap().as_ref(), &paint, ts, None);
            }
            None => log::debug!("image {} has no decoded pixels yet", obj.id),
        },
    }
}

fn build_path(commands: &[PathCmd]) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for cmd in commands {
        match *cmd {
            PathCmd::MoveTo(x, y) => pb.move_to(x as f32, y as f32),
            PathCmd::LineTo(x, y) => pb.line_to(x as f32, y as f32),
            PathCmd::QuadTo(cx, cy, x, y) => {
                pb.quad_to(cx as f32, cy as f32, x as f32, y as f32)
            }
            PathCmd::Close => pb.close(),
        }
    }
    pb.finish()
}

fn paint_shape(pixmap: &mut Pixmap, path: &tiny_skia::Path, style: &ObjectStyle, ts: Transform) {
    let opacity = style.opacity.clamp(0.0, 1.0) as f32;

    if !style.fill.is_transparent() {
        let paint = solid(style.fill.with_opacity(opacity));
        pixmap.fill_path(path, &paint, FillRule::Winding, ts, None);
    }

    if !style.stroke.is_transparent() && style.stroke_width > 0.0 {
        let paint = solid(style.stroke.with_opacity(opacity));
        let mut stroke = Stroke {
            width: style.stroke_width as f32,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        if let Some([on, off]) = style.dash {
            stroke.dash = StrokeDash::new(vec![on as f32, off as f32], 0.0);
        }
        pixmap.stroke_path(path, &paint, &stroke, ts, None);
    }
}

fn solid(color: Color) -> Paint<'static> {
    let [r, g, b, a] = color.to_rgba8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

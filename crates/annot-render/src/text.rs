//! Text objects: font registry, line layout and glyph outlines.
//!
//! Fonts are supplied by the host as raw TTF/OTF bytes; nothing is bundled.
//! The rasterizer fills glyph outlines through the object's transform, so
//! text scales, rotates and flips with its box. Hosts that draw text with
//! their own engine (the browser canvas) use [`text_runs`] instead.

use crate::error::RenderError;
use ab_glyph::{Font, FontArc, GlyphId, OutlineCurve, PxScale, ScaleFont};
use annot_core::model::{ObjectKind, Scene, TEXT_LINE_HEIGHT};
use annot_core::Color;
use kurbo::Affine;
use std::collections::HashMap;
use tiny_skia::PathBuilder;

// ─── Fonts ───────────────────────────────────────────────────────────────

/// Registered font faces by family name. The first face registered doubles
/// as the fallback for unknown families.
#[derive(Clone, Default)]
pub struct FontBook {
    faces: HashMap<String, FontArc>,
    fallback: Option<FontArc>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `bytes` and register them under `family`.
    pub fn insert(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), RenderError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| RenderError::Font(format!("{family}: {e}")))?;
        if self.fallback.is_none() {
            self.fallback = Some(font.clone());
        }
        self.faces.insert(family_key(family), font);
        log::debug!("font {family:?} registered");
        Ok(())
    }

    /// Face for a CSS-style family list (`"Inter, Arial"`): the first listed
    /// family that is registered, else the fallback.
    pub fn resolve(&self, families: &str) -> Option<&FontArc> {
        families
            .split(',')
            .find_map(|f| self.faces.get(&family_key(f)))
            .or(self.fallback.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut families: Vec<&String> = self.faces.keys().collect();
        families.sort();
        f.debug_struct("FontBook").field("families", &families).finish()
    }
}

fn family_key(family: &str) -> String {
    family.trim().trim_matches(['"', '\'']).to_ascii_lowercase()
}

// ─── Layout ──────────────────────────────────────────────────────────────

/// Top of line `row`, relative to the text box.
pub fn line_top(row: usize, font_size: f64) -> f64 {
    row as f64 * font_size * TEXT_LINE_HEIGHT
}

/// One text object prepared for a host text engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub lines: Vec<String>,
    pub font_family: String,
    pub font_size: f64,
    pub color: Color,
    pub opacity: f64,
    /// Text box → target coordinates, as `[a, b, c, d, e, f]`.
    pub transform: [f64; 6],
}

/// Every text object in `scene`, with `base` (e.g. the viewport) applied.
pub fn text_runs(scene: &Scene, base: Affine) -> Vec<TextRun> {
    scene
        .iter()
        .filter_map(|obj| match &obj.kind {
            ObjectKind::Text {
                text,
                font_family,
                font_size,
            } => Some(TextRun {
                lines: text.split('\n').map(str::to_string).collect(),
                font_family: font_family.clone(),
                font_size: *font_size,
                color: obj.style.fill,
                opacity: obj.style.opacity,
                transform: (base * obj.affine()).as_coeffs(),
            }),
            _ => None,
        })
        .collect()
}

// ─── Outlines ────────────────────────────────────────────────────────────

/// Glyph outlines of `text` in text-box coordinates, one line per `\n`.
pub(crate) fn glyph_path(font: &FontArc, text: &str, font_size: f64) -> Option<tiny_skia::Path> {
    let scaled = font.as_scaled(PxScale::from(font_size as f32));
    let (sx, sy) = (scaled.h_scale_factor(), scaled.v_scale_factor());
    let mut pb = PathBuilder::new();

    for (row, line) in text.split('\n').enumerate() {
        let baseline = line_top(row, font_size) as f32 + scaled.ascent();
        let mut caret = 0.0_f32;
        let mut prev: Option<GlyphId> = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            if let Some(outline) = font.outline(id) {
                // Font units are y-up.
                let x0 = caret;
                append_curves(&mut pb, &outline.curves, |p| {
                    (x0 + p.x * sx, baseline - p.y * sy)
                });
            }
            caret += scaled.h_advance(id);
            prev = Some(id);
        }
    }
    pb.finish()
}

fn append_curves(
    pb: &mut PathBuilder,
    curves: &[OutlineCurve],
    map: impl Fn(ab_glyph::Point) -> (f32, f32),
) {
    let mut last: Option<ab_glyph::Point> = None;
    for curve in curves {
        let start = match curve {
            OutlineCurve::Line(a, _) | OutlineCurve::Quad(a, _, _) | OutlineCurve::Cubic(a, _, _, _) => *a,
        };
        if last != Some(start) {
            if last.is_some() {
                pb.close();
            }
            let (x, y) = map(start);
            pb.move_to(x, y);
        }
        let end = match curve {
            OutlineCurve::Line(_, b) => {
                let (x, y) = map(*b);
                pb.line_to(x, y);
                *b
            }
            OutlineCurve::Quad(_, c, b) => {
                let ((cx, cy), (x, y)) = (map(*c), map(*b));
                pb.quad_to(cx, cy, x, y);
                *b
            }
            OutlineCurve::Cubic(_, c1, c2, b) => {
                let ((ax, ay), (bx, by), (x, y)) = (map(*c1), map(*c2), map(*b));
                pb.cubic_to(ax, ay, bx, by, x, y);
                *b
            }
        };
        last = Some(end);
    }
    if last.is_some() {
        pb.close();
    }
}

//! Clipboard and duplication.
//!
//! The clipboard is a single slot shared by every editor on the page. Plain
//! objects are stored as structural clones. Images are stored as a raster
//! descriptor whose pixels are extracted through an ordered list of
//! strategies: the first one producing a plausible payload wins.

use crate::error::EditorError;
use annot_core::model::{ObjectKind, ObjectStyle, Scene, SceneObject, Transform};
use annot_render::pixels::{is_data_uri, png_data_uri, DecodedImage, ImageCache};
use annot_render::raster::render_region;
use annot_render::text::FontBook;
use kurbo::Size;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything needed to re-create a copied image.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDescriptor {
    pub src: String,
    pub transform: Transform,
    pub natural_width: u32,
    pub natural_height: u32,
    /// Size on the canvas at zoom 1; kept when the payload was rescaled.
    pub rendered: Size,
    pub style: ObjectStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardEntry {
    Raster(RasterDescriptor),
    Object(Box<SceneObject>),
}

impl ClipboardEntry {
    /// A new object for this entry, with fresh ids, shifted by `offset` on
    /// both axes.
    pub fn instantiate(&self, offset: f64) -> SceneObject {
        match self {
            ClipboardEntry::Raster(desc) => {
                let mut obj = SceneObject::fresh(ObjectKind::Image {
                    src: desc.src.clone(),
                    natural_width: desc.natural_width,
                    natural_height: desc.natural_height,
                })
                .with_style(desc.style);
                obj.transform = desc.transform.translated(offset, offset);
                obj
            }
            ClipboardEntry::Object(obj) => {
                let mut copy = obj.with_fresh_ids();
                copy.translate(offset, offset);
                copy
            }
        }
    }

    /// Rendered size to restore once the pasted image's pixels are known.
    pub fn rendered_size(&self) -> Option<Size> {
        match self {
            ClipboardEntry::Raster(desc) => Some(desc.rendered),
            ClipboardEntry::Object(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<ClipboardEntry>,
    pastes: u32,
}

/// Handle to a clipboard slot. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct Clipboard(Rc<RefCell<Slot>>);

thread_local! {
    static SHARED: Clipboard = Clipboard::default();
}

impl Clipboard {
    /// A private slot, for tests and embedders that want isolation.
    pub fn new() -> Self {
        Self::default()
    }

    /// The page-wide slot.
    pub fn shared() -> Self {
        SHARED.with(Clipboard::clone)
    }

    /// Overwrite the slot and restart the paste cascade.
    pub fn store(&self, entry: ClipboardEntry) {
        let mut slot = self.0.borrow_mut();
        slot.entry = Some(entry);
        slot.pastes = 0;
    }

    pub fn peek(&self) -> Option<ClipboardEntry> {
        self.0.borrow().entry.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().entry.is_none()
    }

    /// Count one more paste of the current entry; the n-th paste returns n.
    pub fn next_paste(&self) -> u32 {
        let mut slot = self.0.borrow_mut();
        slot.pastes += 1;
        slot.pastes
    }
}

// ─── Pixel extraction ────────────────────────────────────────────────────

/// What an extraction strategy may draw on.
pub struct ExtractionInput<'a> {
    pub object: &'a SceneObject,
    pub scene: &'a Scene,
    pub images: &'a ImageCache,
    pub fonts: &'a FontBook,
    /// Decoded pixels of the object's source, if loaded.
    pub pixels: Option<&'a DecodedImage>,
}

pub trait PixelExtractor {
    fn name(&self) -> &'static str;

    fn extract(&self, input: &ExtractionInput) -> Option<String>;

    /// Whether the result is a pixel payload subject to the length check.
    fn is_payload(&self) -> bool {
        true
    }
}

/// The source is already an embedded data URI.
pub struct SourceDataUri;

impl PixelExtractor for SourceDataUri {
    fn name(&self) -> &'static str {
        "source data URI"
    }

    fn extract(&self, input: &ExtractionInput) -> Option<String> {
        input
            .object
            .image_src()
            .filter(|src| is_data_uri(src))
            .map(str::to_string)
    }
}

/// Reuse the original source reference as-is (duplicate only).
pub struct OriginalSource;

impl PixelExtractor for OriginalSource {
    fn name(&self) -> &'static str {
        "original source"
    }

    fn extract(&self, input: &ExtractionInput) -> Option<String> {
        input
            .object
            .image_src()
            .filter(|src| !src.is_empty())
            .map(str::to_string)
    }

    fn is_payload(&self) -> bool {
        false
    }
}

/// Re-encode the decoded pixels offscreen as PNG.
pub struct OffscreenReencode(pub f64);

impl PixelExtractor for OffscreenReencode {
    fn name(&self) -> &'static str {
        "offscreen re-encode"
    }

    fn extract(&self, input: &ExtractionInput) -> Option<String> {
        input.pixels?.to_png_data_uri(self.0).ok()
    }
}

/// Cut the object's bounds out of a render of the scene.
pub struct LiveSurfaceRegion;

impl PixelExtractor for LiveSurfaceRegion {
    fn name(&self) -> &'static str {
        "live surface region"
    }

    fn extract(&self, input: &ExtractionInput) -> Option<String> {
        let region = input.object.bounding_rect();
        let img = render_region(input.scene, input.images, input.fonts, region, 1.0).ok()?;
        png_data_uri(&img).ok()
    }
}

/// Strategies used by copy.
pub fn copy_strategies() -> Vec<Box<dyn PixelExtractor>> {
    vec![
        Box::new(SourceDataUri),
        Box::new(OffscreenReencode(1.0)),
        Box::new(LiveSurfaceRegion),
    ]
}

/// Strategies used by duplicate: the original source first, re-rasterizing
/// at twice the resolution when forced.
pub fn duplicate_strategies() -> Vec<Box<dyn PixelExtractor>> {
    vec![
        Box::new(OriginalSource),
        Box::new(OffscreenReencode(2.0)),
        Box::new(LiveSurfaceRegion),
    ]
}

/// Run `strategies` in order. Payloads of `min_payload` characters or
/// fewer are treated as truncated and skipped.
pub fn extract_pixels(
    strategies: &[Box<dyn PixelExtractor>],
    input: &ExtractionInput,
    min_payload: usize,
) -> Result<String, EditorError> {
    for strategy in strategies {
        match strategy.extract(input) {
            Some(out) if !strategy.is_payload() || out.len() > min_payload => {
                log::debug!("pixels for {} via {}", input.object.id, strategy.name());
                return Ok(out);
            }
            Some(out) => log::warn!(
                "{} gave a {}-byte payload for {}, skipping",
                strategy.name(),
                out.len(),
                input.object.id
            ),
            None => log::trace!("{} unavailable for {}", strategy.name(), input.object.id),
        }
    }
    log::error!("no pixel source for {}", input.object.id);
    Err(EditorError::PixelsUnavailable)
}

/// Build the clipboard entry for `input.object`.
pub fn capture(
    input: &ExtractionInput,
    strategies: &[Box<dyn PixelExtractor>],
    min_payload: usize,
) -> Result<ClipboardEntry, EditorError> {
    let ObjectKind::Image {
        natural_width,
        natural_height,
        ..
    } = input.object.kind
    else {
        return Ok(ClipboardEntry::Object(Box::new(input.object.clone())));
    };

    let src = extract_pixels(strategies, input, min_payload)?;
    Ok(ClipboardEntry::Raster(RasterDescriptor {
        src,
        transform: input.object.transform,
        natural_width,
        natural_height,
        rendered: input.object.rendered_size(),
        style: input.object.style,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use annot_core::id::ObjectId;
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    fn image_object(src: &str) -> SceneObject {
        SceneObject::new(
            ObjectId::intern("clip_img"),
            ObjectKind::Image {
                src: src.into(),
                natural_width: 8,
                natural_height: 8,
            },
        )
        .at(10.0, 10.0)
    }

    #[test]
    fn shared_slot_is_shared() {
        let a = Clipboard::shared();
        let b = Clipboard::shared();
        a.store(ClipboardEntry::Object(Box::new(image_object("x"))));
        assert!(!b.is_empty());
        assert!(Clipboard::new().is_empty());
    }

    #[test]
    fn paste_counter_restarts_on_store() {
        let clip = Clipboard::new();
        let entry = ClipboardEntry::Object(Box::new(image_object("x")));
        clip.store(entry.clone());
        assert_eq!(clip.next_paste(), 1);
        assert_eq!(clip.next_paste(), 2);
        clip.store(entry);
        assert_eq!(clip.next_paste(), 1);
    }

    #[test]
    fn instantiate_offsets_and_renames() {
        let original = SceneObject::new(
            ObjectId::intern("clip_rect"),
            ObjectKind::Rect {
                width: 5.0,
                height: 5.0,
            },
        )
        .at(100.0, 100.0);
        let entry = ClipboardEntry::Object(Box::new(original.clone()));
        let pasted = entry.instantiate(40.0);
        assert_ne!(pasted.id, original.id);
        assert_eq!(pasted.transform.origin(), kurbo::Point::new(140.0, 140.0));
    }

    #[test]
    fn short_payloads_fall_through() {
        let scene = Scene::new();
        let images = ImageCache::new();
        let obj = image_object("data:image/png;base64,AAAA");
        let pixels =
            DecodedImage::from_rgba(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]))).unwrap();
        let input = ExtractionInput {
            object: &obj,
            scene: &scene,
            images: &images,
            fonts: &FontBook::new(),
            pixels: Some(&pixels),
        };
        let uri = extract_pixels(&copy_strategies(), &input, 100).unwrap();
        // The truncated source was skipped in favour of a re-encode.
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(uri.len() > 100);

        let input = ExtractionInput {
            pixels: None,
            ..input
        };
        let strategies: Vec<Box<dyn PixelExtractor>> = vec![Box::new(SourceDataUri)];
        assert!(matches!(
            extract_pixels(&strategies, &input, 100),
            Err(EditorError::PixelsUnavailable)
        ));
    }

    #[test]
    fn duplicate_prefers_remote_source() {
        let scene = Scene::new();
        let images = ImageCache::new();
        let obj = image_object("https://cdn.example/a.png");
        let input = ExtractionInput {
            object: &obj,
            scene: &scene,
            images: &images,
            fonts: &FontBook::new(),
            pixels: None,
        };
        match capture(&input, &duplicate_strategies(), 100).unwrap() {
            ClipboardEntry::Raster(desc) => {
                assert_eq!(desc.src, "https://cdn.example/a.png");
                assert_eq!(desc.rendered, Size::new(8.0, 8.0));
            }
            _ => panic!("expected Raster"),
        }
    }
}

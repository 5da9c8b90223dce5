//! Interactive image crop.
//!
//! A crop session freezes the rest of the scene, sends the image to the
//! back and lays a dashed crop rectangle over it, with four translucent
//! strips darkening what will be cut away. The rectangle is the only thing
//! the user can move or resize; after every change it is pulled back inside
//! the image. Applying the crop swaps the image for a new one (new id) made
//! of just the selected pixels.

use crate::config::EditorConfig;
use crate::error::EditorError;
use annot_core::geometry::{centered_in, constrain_rect, surrounding_strips};
use annot_core::id::ObjectId;
use annot_core::model::{ObjectKind, ObjectStyle, Scene, SceneObject};
use annot_core::Color;
use annot_render::pixels::{png_data_uri, DecodedImage};
use kurbo::Rect;

/// Smallest fraction of the image a crop may keep on either axis.
const MIN_FRACTION: f64 = 0.01;
/// Largest fraction the crop origin may start at.
const MAX_ORIGIN_FRACTION: f64 = 0.99;

const CROP_STROKE_WIDTH: f64 = 4.0;
const CROP_DASH: [f64; 2] = [8.0, 4.0];

fn overlay_fill() -> Color {
    Color::rgba(0.0, 0.0, 0.0, 0.5)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropSession {
    image: ObjectId,
    image_index: usize,
    image_bounds: Rect,
    rect: ObjectId,
    overlays: [ObjectId; 4],
    /// Interaction flags to restore when the session ends.
    suspended: Vec<(ObjectId, bool, bool)>,
    min_size: f64,
}

impl CropSession {
    /// Start cropping `image`. Fails without touching the scene unless it
    /// names an image object.
    pub fn begin(
        scene: &mut Scene,
        image: ObjectId,
        config: &EditorConfig,
    ) -> Result<Self, EditorError> {
        let obj = scene.get(image).ok_or(EditorError::NoSelection)?;
        if !obj.is_image() {
            return Err(EditorError::NotAnImage);
        }
        let image_bounds = obj.bounding_rect();
        let image_index = scene.index_of(image).unwrap_or(0);

        let suspended = scene
            .objects
            .iter_mut()
            .map(|o| {
                let flags = (o.id, o.selectable, o.evented);
                o.set_interactive(false);
                flags
            })
            .collect();
        scene.send_to_back(image);

        let width = (image_bounds.width() * config.crop_initial_ratio).max(config.crop_initial_min);
        let height =
            (image_bounds.height() * config.crop_initial_ratio).max(config.crop_initial_min);
        let initial = constrain_rect(
            centered_in(image_bounds, width, height),
            image_bounds,
            config.crop_min_size,
        );

        let strips = surrounding_strips(image_bounds, initial);
        let overlays = strips.map(|strip| {
            let mut overlay = rect_object(strip).with_style(ObjectStyle::filled(overlay_fill()));
            overlay.set_interactive(false);
            overlay.exclude_from_export = true;
            scene.add(overlay)
        });

        let mut crop = rect_object(initial).with_style(ObjectStyle {
            dash: Some(CROP_DASH),
            ..ObjectStyle::stroked(Color::BLACK, CROP_STROKE_WIDTH)
        });
        crop.exclude_from_export = true;
        let rect = scene.add(crop);

        log::debug!("crop started on {image}");
        Ok(Self {
            image,
            image_index,
            image_bounds,
            rect,
            overlays,
            suspended,
            min_size: config.crop_min_size,
        })
    }

    pub fn image(&self) -> ObjectId {
        self.image
    }

    /// The crop rectangle object (the one the user drags).
    pub fn rect_id(&self) -> ObjectId {
        self.rect
    }

    pub fn image_bounds(&self) -> Rect {
        self.image_bounds
    }

    /// Objects created by the session itself.
    pub fn owns(&self, id: ObjectId) -> bool {
        id == self.rect || self.overlays.contains(&id)
    }

    pub fn crop_rect(&self, scene: &Scene) -> Option<Rect> {
        scene.get(self.rect).map(SceneObject::bounding_rect)
    }

    /// Pull the crop rectangle back inside the image, bake its scale into
    /// its size, and refit the overlays around it.
    pub fn constrain(&self, scene: &mut Scene) {
        let Some(current) = self.crop_rect(scene) else {
            return;
        };
        let fitted = constrain_rect(current, self.image_bounds, self.min_size);
        if let Some(rect) = scene.get_mut(self.rect) {
            reshape(rect, fitted);
        }
        let strips = surrounding_strips(self.image_bounds, fitted);
        for (id, strip) in self.overlays.iter().zip(strips) {
            if let Some(overlay) = scene.get_mut(*id) {
                reshape(overlay, strip);
            }
        }
    }

    /// Cut the selected region out of `pixels` (the image's full-resolution
    /// decode) as a new image object placed over the crop rectangle.
    pub fn build_cropped(
        &self,
        scene: &Scene,
        pixels: &DecodedImage,
    ) -> Result<SceneObject, EditorError> {
        let original = scene.get(self.image).ok_or(EditorError::CropInactive)?;
        let rect = self.crop_rect(scene).ok_or(EditorError::CropInactive)?;
        let b = self.image_bounds;

        let left = ((rect.x0 - b.x0) / b.width()).clamp(0.0, MAX_ORIGIN_FRACTION);
        let top = ((rect.y0 - b.y0) / b.height()).clamp(0.0, MAX_ORIGIN_FRACTION);
        let width = (rect.width() / b.width()).max(MIN_FRACTION).min(1.0 - left);
        let height = (rect.height() / b.height()).max(MIN_FRACTION).min(1.0 - top);

        let (nat_w, nat_h) = (f64::from(pixels.width()), f64::from(pixels.height()));
        let px = (left * nat_w).floor() as u32;
        let py = (top * nat_h).floor() as u32;
        let pw = ((width * nat_w).floor() as u32).max(1);
        let ph = ((height * nat_h).floor() as u32).max(1);

        let region = pixels.crop(px, py, pw, ph);
        let (pw, ph) = region.dimensions();
        let src = png_data_uri(&region)?;

        let mut cropped = SceneObject::fresh(ObjectKind::Image {
            src,
            natural_width: pw,
            natural_height: ph,
        })
        .at(rect.x0, rect.y0)
        .with_style(original.style);
        cropped.transform.scale_x = rect.width() / f64::from(pw);
        cropped.transform.scale_y = rect.height() / f64::from(ph);
        Ok(cropped)
    }

    /// Replace the original image with `replacement` and tear the session
    /// down. Returns the replacement's id.
    pub fn finish(self, scene: &mut Scene, replacement: SceneObject) -> ObjectId {
        self.teardown(scene);
        scene.remove(self.image);
        let id = scene.insert_at(self.image_index, replacement);
        log::debug!("crop applied: {} -> {id}", self.image);
        id
    }

    /// Abandon the crop, leaving the image as it was. Returns its id.
    pub fn cancel(self, scene: &mut Scene) -> ObjectId {
        self.teardown(scene);
        if let Some(obj) = scene.remove(self.image) {
            scene.insert_at(self.image_index, obj);
        }
        log::debug!("crop cancelled on {}", self.image);
        self.image
    }

    fn teardown(&self, scene: &mut Scene) {
        scene.remove(self.rect);
        for id in self.overlays {
            scene.remove(id);
        }
        for (id, selectable, evented) in &self.suspended {
            if let Some(obj) = scene.get_mut(*id) {
                obj.selectable = *selectable;
                obj.evented = *evented;
            }
        }
    }
}

fn rect_object(r: Rect) -> SceneObject {
    SceneObject::fresh(ObjectKind::Rect {
        width: r.width(),
        height: r.height(),
    })
    .at(r.x0, r.y0)
}

fn reshape(obj: &mut SceneObject, r: Rect) {
    obj.kind = ObjectKind::Rect {
        width: r.width(),
        height: r.height(),
    };
    obj.transform.left = r.x0;
    obj.transform.top = r.y0;
    obj.transform.scale_x = 1.0;
    obj.transform.scale_y = 1.0;
}

//! Persisted description content.
//!
//! An issue description is stored either as a structural canvas document or,
//! when that would be too large, as a reference to a rasterized image:
//!
//! ```json
//! { "canvas": { "version": "5.3.0", "objects": [...], "background": "#ffffff",
//!               "canvasWidth": 5000, "canvasHeight": 5000,
//!               "viewportTransform": [1, 0, 0, 1, -2000, -2200] } }
//! { "canvas": null, "imageUrl": "https://…/canvas-export.png", "isImage": true }
//! ```

use crate::color::Color;
use crate::model::{Scene, SceneObject};
use crate::viewport::ViewportTransform;
use serde::{Deserialize, Serialize};

/// Version string written into every document.
pub const DOCUMENT_VERSION: &str = "5.3.0";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed canvas content: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image content without an image URL")]
    MissingImageUrl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    #[serde(default = "default_background")]
    pub background: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_transform: Option<ViewportTransform>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn default_background() -> Color {
    Color::WHITE
}

impl CanvasDocument {
    /// Document with no objects, white background and no canvas geometry.
    pub fn minimal() -> Self {
        Self {
            version: default_version(),
            objects: Vec::new(),
            background: Color::WHITE,
            canvas_width: None,
            canvas_height: None,
            viewport_transform: None,
        }
    }

    /// Capture the exportable part of a scene.
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            objects: scene.exportable().cloned().collect(),
            background: scene.background,
            ..Self::minimal()
        }
    }

    pub fn with_canvas(mut self, width: f64, height: f64, viewport: ViewportTransform) -> Self {
        self.canvas_width = Some(width);
        self.canvas_height = Some(height);
        self.viewport_transform = Some(viewport);
        self
    }

    pub fn into_scene(self) -> Scene {
        Scene {
            objects: self.objects,
            background: self.background,
        }
    }
}

/// What gets handed to the issue store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContent", into = "RawContent")]
pub enum PersistedContent {
    Document(CanvasDocument),
    ImageRef { image_url: String },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    canvas: Option<CanvasDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_image: bool,
}

impl TryFrom<RawContent> for PersistedContent {
    type Error = DocumentError;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        if raw.is_image {
            let image_url = raw.image_url.ok_or(DocumentError::MissingImageUrl)?;
            return Ok(PersistedContent::ImageRef { image_url });
        }
        // `{canvas: null}` without an image is an empty description.
        Ok(PersistedContent::Document(
            raw.canvas.unwrap_or_else(CanvasDocument::minimal),
        ))
    }
}

impl From<PersistedContent> for RawContent {
    fn from(content: PersistedContent) -> Self {
        match content {
            PersistedContent::Document(doc) => RawContent {
                canvas: Some(doc),
                image_url: None,
                is_image: false,
            },
            PersistedContent::ImageRef { image_url } => RawContent {
                canvas: None,
                image_url: Some(image_url),
                is_image: true,
            },
        }
    }
}

impl PersistedContent {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact serialization, the form whose byte length is checked
    /// against the storage limit.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, PersistedContent::ImageRef { .. })
    }
}

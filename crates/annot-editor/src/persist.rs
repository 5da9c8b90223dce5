//! Saving and loading issue descriptions.
//!
//! A description is saved as a structural document when its compact JSON
//! fits the storage limit. Larger scenes are rasterized to PNG, uploaded,
//! and saved as an image reference instead; content too large to fit one
//! surface is rendered at a reduced scale, and if rasterizing still fails a
//! minimal document is saved rather than nothing. Upload and issue storage are
//! external services reached through the async traits below.

use crate::config::EditorConfig;
use crate::error::EditorError;
use annot_core::document::{CanvasDocument, PersistedContent};
use annot_core::model::Scene;
use annot_core::viewport::{ViewportTransform, VirtualCanvas};
use annot_render::pixels::{encode_png, ImageCache};
use annot_render::raster::{content_bounds, fit_multiplier, render_region};
use annot_render::text::FontBook;
use annot_render::RenderError;
use serde::{Deserialize, Serialize};
use std::future::Future;

pub const EXPORT_FILENAME: &str = "canvas-export.png";
pub const EXPORT_MIME: &str = "image/png";

// ─── Service interfaces ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub url: String,
    pub key: String,
    pub mime: String,
    pub size: usize,
}

/// Failure reported by an external service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

pub trait UploadService {
    fn upload(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        filename: &str,
    ) -> impl Future<Output = Result<UploadResult, ServiceError>>;
}

/// Where a finished description goes (the host's `onSave`).
pub trait ContentSink {
    fn save(&self, content: PersistedContent) -> impl Future<Output = Result<(), ServiceError>>;
}

/// Issue persistence keyed by issue id.
pub trait IssueStore {
    fn save(
        &self,
        issue_id: &str,
        content: PersistedContent,
    ) -> impl Future<Output = Result<(), ServiceError>>;

    fn load(
        &self,
        issue_id: &str,
    ) -> impl Future<Output = Result<Option<PersistedContent>, ServiceError>>;
}

/// Saves into one issue of an [`IssueStore`].
pub struct IssueSink<'a, S> {
    store: &'a S,
    issue_id: String,
}

impl<'a, S: IssueStore> IssueSink<'a, S> {
    pub fn new(store: &'a S, issue_id: impl Into<String>) -> Self {
        Self {
            store,
            issue_id: issue_id.into(),
        }
    }
}

impl<S: IssueStore> ContentSink for IssueSink<'_, S> {
    fn save(&self, content: PersistedContent) -> impl Future<Output = Result<(), ServiceError>> {
        self.store.save(&self.issue_id, content)
    }
}

// ─── Save planning ───────────────────────────────────────────────────────

/// What a save will write, decided synchronously from the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SavePlan {
    Structural {
        content: PersistedContent,
        bytes: usize,
    },
    /// Too large as a document; upload this PNG and save a reference.
    Raster { png: Vec<u8>, structural_bytes: usize },
    /// Too large, but there was nothing to rasterize.
    Minimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Structural { bytes: usize },
    Rasterized { upload: UploadResult },
    Minimal,
}

/// Build the structural document for the scene as it stands.
pub fn build_document(
    scene: &Scene,
    canvas: &VirtualCanvas,
    viewport: &ViewportTransform,
) -> CanvasDocument {
    CanvasDocument::from_scene(scene).with_canvas(canvas.width, canvas.height, *viewport)
}

pub fn plan_save(
    scene: &Scene,
    images: &ImageCache,
    fonts: &FontBook,
    canvas: &VirtualCanvas,
    viewport: &ViewportTransform,
    config: &EditorConfig,
) -> Result<SavePlan, EditorError> {
    let content = PersistedContent::Document(build_document(scene, canvas, viewport));
    let bytes = content.to_json()?.len();
    if bytes <= config.max_persisted_bytes {
        log::debug!("saving structural document ({bytes} bytes)");
        return Ok(SavePlan::Structural { content, bytes });
    }

    log::warn!(
        "document is {bytes} bytes, over the {} byte limit; rasterizing",
        config.max_persisted_bytes
    );
    let Some(bounds) = content_bounds(scene) else {
        return Ok(SavePlan::Minimal);
    };
    let multiplier = fit_multiplier(bounds, 1.0);
    if multiplier < 1.0 {
        log::warn!("content spans {bounds:?}; rasterizing at {multiplier:.3}x");
    }
    let png =
        render_region(scene, images, fonts, bounds, multiplier).and_then(|img| encode_png(&img));
    Ok(raster_or_minimal(png, bytes))
}

fn raster_or_minimal(png: Result<Vec<u8>, RenderError>, structural_bytes: usize) -> SavePlan {
    match png {
        Ok(png) => SavePlan::Raster {
            png,
            structural_bytes,
        },
        Err(e) => {
            log::warn!("raster fallback failed ({e}); saving a minimal document");
            SavePlan::Minimal
        }
    }
}

/// Carry out a plan against the external services.
pub async fn execute_save<U, C>(
    plan: SavePlan,
    upload: &U,
    sink: &C,
) -> Result<SaveOutcome, EditorError>
where
    U: UploadService,
    C: ContentSink,
{
    match plan {
        SavePlan::Structural { content, bytes } => {
            sink.save(content).await.map_err(persist_failed)?;
            Ok(SaveOutcome::Structural { bytes })
        }
        SavePlan::Raster { png, .. } => {
            let uploaded = upload
                .upload(png, EXPORT_MIME, EXPORT_FILENAME)
                .await
                .map_err(|e| {
                    log::error!("raster upload failed: {e}");
                    EditorError::Upload(e.0)
                })?;
            sink.save(PersistedContent::ImageRef {
                image_url: uploaded.url.clone(),
            })
            .await
            .map_err(persist_failed)?;
            Ok(SaveOutcome::Rasterized { upload: uploaded })
        }
        SavePlan::Minimal => {
            sink.save(PersistedContent::Document(CanvasDocument::minimal()))
                .await
                .map_err(persist_failed)?;
            Ok(SaveOutcome::Minimal)
        }
    }
}

fn persist_failed(e: ServiceError) -> EditorError {
    log::error!("saving description failed: {e}");
    EditorError::Persist(e.0)
}

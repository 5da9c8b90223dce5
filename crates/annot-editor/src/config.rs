//! Editor tunables.
//!
//! Defaults reproduce the behaviour users already know from the web editor;
//! hosts can override any of them by deserializing a partial JSON object.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Config ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Undo history depth. Default: **50**.
    pub history_limit: usize,

    /// Snapshot coalescing window in milliseconds. Default: **100**.
    pub snapshot_debounce_ms: u64,

    /// Largest structural document stored as-is; anything bigger is saved
    /// as a rasterized image. Default: **921 600** bytes (900 KB).
    pub max_persisted_bytes: usize,

    /// Per-paste cascade offset on both axes. Default: **20**.
    pub paste_offset: f64,

    /// Smallest crop rectangle side. Default: **20**.
    pub crop_min_size: f64,
    /// Initial crop rectangle as a fraction of the image. Default: **0.8**.
    pub crop_initial_ratio: f64,
    /// Initial crop rectangle floor. Default: **50**.
    pub crop_initial_min: f64,

    /// Pointer slop in screen pixels for hit testing and resize handles.
    pub hit_tolerance: f64,

    /// Widest an image-only description is shown when loaded. Default: **800**.
    pub loaded_image_max_width: f64,
    /// Width of an inserted image. Default: **300**.
    pub insert_image_width: f64,
    /// Inserted width when the source itself is wider than this. Default: **400**.
    pub insert_image_wide_width: f64,

    /// Data URIs at or below this length are treated as truncated.
    pub min_pixel_payload: usize,

    /// How long a remote image may stay undelivered before it counts as
    /// failed. Default: **30 000** ms.
    pub image_wait_ms: u64,

    /// Content of a freshly placed text object.
    pub text_placeholder: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            snapshot_debounce_ms: 100,
            max_persisted_bytes: 900 * 1024,
            paste_offset: 20.0,
            crop_min_size: 20.0,
            crop_initial_ratio: 0.8,
            crop_initial_min: 50.0,
            hit_tolerance: 6.0,
            loaded_image_max_width: 800.0,
            insert_image_width: 300.0,
            insert_image_wide_width: 400.0,
            min_pixel_payload: 100,
            image_wait_ms: 30_000,
            text_placeholder: "Click to edit".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn snapshot_debounce(&self) -> Duration {
        Duration::from_millis(self.snapshot_debounce_ms)
    }

    pub fn image_wait(&self) -> Duration {
        Duration::from_millis(self.image_wait_ms)
    }

    /// Target width for an inserted image of the given natural width.
    pub fn inserted_image_width(&self, natural_width: f64) -> f64 {
        if natural_width > self.insert_image_wide_width {
            self.insert_image_wide_width
        } else {
            self.insert_image_width
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EditorConfig = serde_json::from_str(r#"{"historyLimit": 10}"#).unwrap();
        assert_eq!(cfg.history_limit, 10);
        assert_eq!(cfg.max_persisted_bytes, 921_600);
        assert_eq!(cfg.snapshot_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn inserted_width_steps_up_for_wide_images() {
        let cfg = EditorConfig::default();
        assert_eq!(cfg.inserted_image_width(250.0), 300.0);
        assert_eq!(cfg.inserted_image_width(400.0), 300.0);
        assert_eq!(cfg.inserted_image_width(1920.0), 400.0);
    }
}

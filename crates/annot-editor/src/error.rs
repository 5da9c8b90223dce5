use annot_core::DocumentError;
use annot_render::RenderError;

/// Everything the editor can refuse or fail at.
///
/// Precondition variants are reported before any state is touched. The
/// `Display` text is what the user sees.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    // ── Preconditions ──
    #[error("select an object first")]
    NoSelection,
    #[error("select a single object")]
    MultipleSelection,
    #[error("the canvas is empty")]
    EmptyScene,
    #[error("the selected object is not an image")]
    NotAnImage,
    #[error("select a text object first")]
    NotText,
    #[error("nothing has been copied yet")]
    ClipboardEmpty,
    #[error("no crop in progress")]
    CropInactive,
    #[error("finish the current crop first")]
    CropActive,

    // ── Pixels ──
    #[error("could not read the image pixels")]
    PixelsUnavailable,
    #[error("image failed to load: {0}")]
    LoadFailed(String),
    /// The host has not delivered the bytes for this source yet.
    #[error("still waiting for image {0}")]
    ImagePending(String),
    #[error(transparent)]
    Render(#[from] RenderError),

    // ── Persistence ──
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("save failed: {0}")]
    Persist(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("history snapshot could not be written: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),
    #[error("history snapshot could not be read: {0}")]
    SnapshotDecode(#[from] rmp_serde::decode::Error),
}

impl EditorError {
    /// Refusals caused by the current selection or mode rather than a fault.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EditorError::NoSelection
                | EditorError::MultipleSelection
                | EditorError::EmptyScene
                | EditorError::NotAnImage
                | EditorError::NotText
                | EditorError::ClipboardEmpty
                | EditorError::CropInactive
                | EditorError::CropActive
                | EditorError::ImagePending(_)
        )
    }
}

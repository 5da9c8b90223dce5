pub mod color;
pub mod document;
pub mod geometry;
pub mod id;
pub mod model;
pub mod viewport;

pub use color::{Color, parse_color};
pub use document::{CanvasDocument, DOCUMENT_VERSION, DocumentError, PersistedContent};
pub use id::ObjectId;
pub use model::*;
pub use viewport::{ViewportTransform, VirtualCanvas};

// Re-export kurbo so downstream crates share one geometry vocabulary
pub use kurbo;

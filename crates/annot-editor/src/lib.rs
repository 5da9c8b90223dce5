pub mod clipboard;
pub mod config;
pub mod crop;
pub mod error;
pub mod history;
pub mod input;
pub mod loader;
pub mod mutation;
pub mod persist;
pub mod session;
pub mod settings;
pub mod shortcuts;
pub mod tools;

pub use clipboard::{Clipboard, ClipboardEntry};
pub use config::EditorConfig;
pub use error::EditorError;
pub use history::History;
pub use input::{Modifiers, PointerButton};
pub use loader::{DataUriLoader, ImageLoader, MemoryLoader};
pub use persist::{
    ContentSink, IssueSink, IssueStore, SaveOutcome, SavePlan, ServiceError, UploadResult,
    UploadService,
};
pub use session::EditorSession;
pub use settings::{MemoryStore, SettingsStore, ToolSettings};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use tools::ToolKind;

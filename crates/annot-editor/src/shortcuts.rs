//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s. The map lives
//! in Rust so the wasm bridge and native hosts resolve keys identically.
//!
//! - ⌘/Ctrl combos edit: undo/redo, clipboard, duplicate, z-order
//! - Bare letters switch tools (V P T R C L A H)
//! - `+` `-` `0` zoom
//! - While a text object is being edited only ⌘/Ctrl combos and Escape
//!   reach the canvas; everything else is typing.

use crate::tools::ToolKind;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Tool switching ──
    Tool(ToolKind),

    // ── Edit ──
    Undo,
    Redo,
    Copy,
    Cut,
    Paste,
    Duplicate,
    Delete,

    // ── Z-order ──
    BringToFront,
    SendToBack,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ZoomReset,
    PanStart,

    // ── Modes ──
    /// Leave text editing, cancel a crop, or drop the selection.
    Cancel,
    ApplyCrop,
}

/// Editor state that changes what a key means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyContext {
    pub cropping: bool,
    pub editing_text: bool,
}

/// Resolves key events into shortcut actions.
///
/// On macOS `meta` is ⌘; elsewhere `ctrl` plays the same role.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"z"`, `"Delete"`).
    /// Returns `None` if the combo has no binding in this context.
    pub fn resolve(
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
        cx: KeyContext,
    ) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "c" | "C" => Some(ShortcutAction::Copy),
                "x" | "X" => Some(ShortcutAction::Cut),
                "v" | "V" => Some(ShortcutAction::Paste),
                "d" | "D" => Some(ShortcutAction::Duplicate),
                "]" => Some(ShortcutAction::BringToFront),
                "[" => Some(ShortcutAction::SendToBack),
                _ => None,
            };
        }

        if key == "Escape" {
            return Some(ShortcutAction::Cancel);
        }
        if cx.editing_text || alt {
            return None;
        }

        if cx.cropping && key == "Enter" {
            return Some(ShortcutAction::ApplyCrop);
        }

        match key {
            "+" | "=" => return Some(ShortcutAction::ZoomIn),
            "-" => return Some(ShortcutAction::ZoomOut),
            "0" => return Some(ShortcutAction::ZoomReset),
            "Delete" | "Backspace" => return Some(ShortcutAction::Delete),
            " " => return Some(ShortcutAction::PanStart),
            _ => {}
        }

        // ── Single letters (no modifiers) ──
        if shift {
            return None;
        }
        let tool = match key {
            "v" | "V" => ToolKind::Select,
            "p" | "P" => ToolKind::Draw,
            "t" | "T" => ToolKind::Text,
            "r" | "R" => ToolKind::Rect,
            // C is the crop button's letter while cropping
            "c" | "C" if !cx.cropping => ToolKind::Circle,
            "l" | "L" => ToolKind::Line,
            "a" | "A" => ToolKind::Arrow,
            "h" | "H" => ToolKind::Highlight,
            _ => return None,
        };
        Some(ShortcutAction::Tool(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(key: &str) -> Option<ShortcutAction> {
        ShortcutMap::resolve(key, false, false, false, false, KeyContext::default())
    }

    fn cmd(key: &str) -> Option<ShortcutAction> {
        ShortcutMap::resolve(key, false, false, false, true, KeyContext::default())
    }

    #[test]
    fn resolve_tool_shortcuts() {
        assert_eq!(bare("v"), Some(ShortcutAction::Tool(ToolKind::Select)));
        assert_eq!(bare("P"), Some(ShortcutAction::Tool(ToolKind::Draw)));
        assert_eq!(bare("t"), Some(ShortcutAction::Tool(ToolKind::Text)));
        assert_eq!(bare("r"), Some(ShortcutAction::Tool(ToolKind::Rect)));
        assert_eq!(bare("c"), Some(ShortcutAction::Tool(ToolKind::Circle)));
        assert_eq!(bare("l"), Some(ShortcutAction::Tool(ToolKind::Line)));
        assert_eq!(bare("a"), Some(ShortcutAction::Tool(ToolKind::Arrow)));
        assert_eq!(bare("h"), Some(ShortcutAction::Tool(ToolKind::Highlight)));
    }

    #[test]
    fn resolve_undo_redo() {
        assert_eq!(cmd("z"), Some(ShortcutAction::Undo));
        assert_eq!(
            ShortcutMap::resolve("z", true, false, false, false, KeyContext::default()),
            Some(ShortcutAction::Undo)
        );
        assert_eq!(
            ShortcutMap::resolve("Z", false, true, false, true, KeyContext::default()),
            Some(ShortcutAction::Redo)
        );
        assert_eq!(cmd("y"), Some(ShortcutAction::Redo));
    }

    #[test]
    fn resolve_clipboard_and_order() {
        assert_eq!(cmd("c"), Some(ShortcutAction::Copy));
        assert_eq!(cmd("x"), Some(ShortcutAction::Cut));
        assert_eq!(cmd("v"), Some(ShortcutAction::Paste));
        assert_eq!(cmd("d"), Some(ShortcutAction::Duplicate));
        assert_eq!(cmd("]"), Some(ShortcutAction::BringToFront));
        assert_eq!(cmd("["), Some(ShortcutAction::SendToBack));
    }

    #[test]
    fn resolve_zoom_and_delete() {
        assert_eq!(bare("+"), Some(ShortcutAction::ZoomIn));
        assert_eq!(bare("="), Some(ShortcutAction::ZoomIn));
        assert_eq!(bare("-"), Some(ShortcutAction::ZoomOut));
        assert_eq!(bare("0"), Some(ShortcutAction::ZoomReset));
        assert_eq!(bare("Delete"), Some(ShortcutAction::Delete));
        assert_eq!(bare("Backspace"), Some(ShortcutAction::Delete));
    }

    #[test]
    fn crop_context() {
        let cropping = KeyContext {
            cropping: true,
            editing_text: false,
        };
        let resolve = |key| ShortcutMap::resolve(key, false, false, false, false, cropping);
        assert_eq!(resolve("c"), None);
        assert_eq!(resolve("Enter"), Some(ShortcutAction::ApplyCrop));
        assert_eq!(resolve("Escape"), Some(ShortcutAction::Cancel));
        assert_eq!(bare("Enter"), None);
    }

    #[test]
    fn typing_is_not_a_shortcut() {
        let editing = KeyContext {
            cropping: false,
            editing_text: true,
        };
        for key in ["v", "0", "Backspace", " "] {
            assert_eq!(
                ShortcutMap::resolve(key, false, false, false, false, editing),
                None
            );
        }
        assert_eq!(
            ShortcutMap::resolve("z", true, false, false, false, editing),
            Some(ShortcutAction::Undo)
        );
        assert_eq!(
            ShortcutMap::resolve("Escape", false, false, false, false, editing),
            Some(ShortcutAction::Cancel)
        );
    }

    #[test]
    fn resolve_unknown_key() {
        assert_eq!(bare("q"), None);
        assert_eq!(bare("7"), None);
        assert_eq!(cmd("q"), None);
        assert_eq!(
            ShortcutMap::resolve("v", false, true, false, false, KeyContext::default()),
            None
        );
    }
}

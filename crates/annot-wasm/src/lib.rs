//! WASM bridge for the issue canvas: exposes the Rust editor session to
//! the web app.
//!
//! Compiled via `wasm-pack build --target web`. The page owns the `<canvas>`
//! element and the DOM event listeners; it forwards pointer, wheel and key
//! events here, calls `pump` once per animation frame, and paints with
//! `render`.

mod host;

use annot_core::kurbo::Size;
use annot_editor::persist::{self, SaveOutcome};
use annot_editor::session::EditorSession;
use annot_editor::shortcuts::ShortcutAction;
use annot_editor::tools::ToolKind;
use annot_editor::{EditorConfig, EditorError, Modifiers, PointerButton};
use annot_render::text::{line_top, TextRun};
use host::{JsSink, JsUpload, LocalStorageStore, SharedLoader};
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::Clamped;
use web_sys::CanvasRenderingContext2d;

/// One editor instance bound to one canvas element.
#[wasm_bindgen]
pub struct AnnotationCanvas {
    session: EditorSession,
    images: SharedLoader,
}

#[wasm_bindgen]
impl AnnotationCanvas {
    /// Create an editor for a `width`×`height` viewport. `config_json` may
    /// override any [`EditorConfig`] field; unknown or bad input falls back
    /// to the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(width: f64, height: f64, config_json: Option<String>) -> Self {
        host::install_console();

        let config = match config_json.as_deref().map(serde_json::from_str::<EditorConfig>) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                log::warn!("ignoring editor config: {e}");
                EditorConfig::default()
            }
            None => EditorConfig::default(),
        };
        let images = SharedLoader::default();
        let mut session = EditorSession::new(Size::new(width, height), config)
            .with_loader(Box::new(images.clone()));
        if let Some(store) = LocalStorageStore::open() {
            session = session.with_settings_store(Box::new(store));
        }
        Self { session, images }
    }

    /// Load a stored description (`{canvas, imageUrl?, isImage?}` JSON).
    /// Returns `false` if it could not be read; the canvas is then empty.
    pub fn load(&mut self, json: &str) -> bool {
        let result = self.session.load_json(json);
        self.report(result)
    }

    /// Hand over fetched bytes for a remote image source.
    pub fn provide_image(&mut self, src: &str, bytes: &[u8]) {
        self.images.provide(src, bytes.to_vec());
    }

    /// The fetch for `src` failed; objects waiting on it are given up on.
    pub fn image_failed(&mut self, src: &str, reason: &str) {
        self.images.fail(src, reason);
    }

    /// Remote sources the editor is waiting for, as a JSON array of URLs.
    /// Fetch each and pass the bytes to `provide_image`.
    pub fn pending_image_sources(&self) -> String {
        serde_json::to_string(&self.session.pending_image_sources())
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// Register TTF/OTF bytes for `family`. Used when exporting or
    /// rasterizing text; the on-screen canvas uses the page's own fonts.
    pub fn provide_font(&mut self, family: &str, bytes: &[u8]) -> bool {
        let result = self.session.provide_font(family, bytes.to_vec());
        self.report(result)
    }

    /// Run deferred work. Call once per animation frame with
    /// `performance.now()`.
    pub fn pump(&mut self, time_ms: f64) {
        self.session
            .pump(Duration::from_secs_f64(time_ms.max(0.0) / 1000.0));
    }

    /// Paint the visible viewport into `ctx`: shapes and images from the
    /// rasterizer, then text with the canvas's own text engine.
    pub fn render(&self, ctx: &CanvasRenderingContext2d) -> bool {
        let img = match self.session.render_view_shapes() {
            Ok(img) => img,
            Err(e) => {
                log::error!("render failed: {e}");
                return false;
            }
        };
        let (w, h) = (img.width(), img.height());
        let raw = img.into_raw();
        let painted = web_sys::ImageData::new_with_u8_clamped_array_and_sh(Clamped(&raw[..]), w, h)
            .and_then(|data| ctx.put_image_data(&data, 0.0, 0.0))
            .and_then(|()| draw_text(ctx, &self.session.text_runs()));
        if let Err(e) = &painted {
            log::error!("render failed: {e:?}");
        }
        painted.is_ok()
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.session.resize(width, height);
    }

    /// Called with `true`/`false` as editing starts and ends.
    pub fn on_editing_change(&mut self, callback: js_sys::Function) {
        self.session.set_editing_listener(move |editing| {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_bool(editing)) {
                log::warn!("editing listener threw: {e:?}");
            }
        });
    }

    // ─── Pointer & keyboard ──────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn handle_pointer_down(
        &mut self,
        x: f64,
        y: f64,
        button: i16,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) {
        let modifiers = modifiers(shift, ctrl, alt, meta);
        self.session
            .pointer_down(x, y, PointerButton::from_dom(button), modifiers);
    }

    pub fn handle_pointer_move(&mut self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) {
        self.session
            .pointer_move(x, y, modifiers(shift, ctrl, alt, meta));
    }

    pub fn handle_pointer_up(&mut self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) {
        self.session
            .pointer_up(x, y, modifiers(shift, ctrl, alt, meta));
    }

    /// Wheel zoom at the pointer. Returns the new zoom level.
    pub fn handle_wheel(&mut self, delta_y: f64, x: f64, y: f64) -> f64 {
        self.session.wheel(delta_y, x, y)
    }

    /// Handle a key press. Returns a JSON string:
    /// `{"handled":bool, "action":"<action_name>", "tool":"<tool_name>"}`.
    /// The page should `preventDefault()` when `handled` is true.
    pub fn handle_key(&mut self, key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> String {
        let action = self.session.handle_key(key, ctrl, shift, alt, meta);
        let tool = tool_name(self.session.active_tool());
        match action {
            Some(action) => format!(
                r#"{{"handled":true,"action":"{}","tool":"{tool}"}}"#,
                action_name(action)
            ),
            None => format!(r#"{{"handled":false,"action":"none","tool":"{tool}"}}"#),
        }
    }

    pub fn handle_key_up(&mut self, key: &str) {
        self.session.key_up(key);
    }

    // ─── Tools & settings ────────────────────────────────────────────────

    /// Switch tool by name (`select`, `draw`, `rect`, …).
    pub fn set_tool(&mut self, name: &str) -> bool {
        match tool_from_name(name) {
            Some(tool) => self.session.set_tool(tool),
            None => {
                log::warn!("unknown tool {name:?}");
                false
            }
        }
    }

    pub fn get_tool_name(&self) -> String {
        tool_name(self.session.active_tool())
    }

    /// Sticky settings as JSON.
    pub fn get_settings_json(&self) -> String {
        serde_json::to_string(self.session.settings()).unwrap_or_default()
    }

    pub fn set_drawing_color(&mut self, css: &str) -> bool {
        match annot_core::parse_color(css) {
            Some(color) => {
                self.session.set_drawing_color(color);
                true
            }
            None => false,
        }
    }

    pub fn set_drawing_width(&mut self, width: f64) {
        self.session.set_drawing_width(width);
    }

    pub fn set_font_family(&mut self, family: &str) {
        self.session.set_font_family(family);
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.session.set_font_size(size);
    }

    /// The page asked for an image (image tool picked). Cleared on read.
    pub fn take_image_request(&mut self) -> bool {
        self.session.take_image_request()
    }

    /// Add an uploaded image at the center of the view.
    pub fn insert_image(&mut self, url: &str) {
        self.session.insert_image(url);
    }

    // ─── Text ────────────────────────────────────────────────────────────

    /// Id of the text object being edited, or empty.
    pub fn editing_text_id(&self) -> String {
        self.session
            .editing_text()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    pub fn set_text(&mut self, content: &str) -> bool {
        let result = self.session.set_text(content);
        self.report(result)
    }

    pub fn end_text_edit(&mut self) {
        self.session.end_text_edit();
    }

    // ─── Edit operations ─────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.session.history().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.history().can_redo()
    }

    pub fn copy(&mut self) -> bool {
        let result = self.session.copy();
        self.report(result)
    }

    pub fn cut(&mut self) -> bool {
        let result = self.session.cut();
        self.report(result)
    }

    pub fn paste(&mut self) -> bool {
        let result = self.session.paste().map(|_| ());
        self.report(result)
    }

    pub fn duplicate(&mut self) -> bool {
        let result = self.session.duplicate().map(|_| ());
        self.report(result)
    }

    pub fn delete_selected(&mut self) -> bool {
        let result = self.session.delete_selection().map(|_| ());
        self.report(result)
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    pub fn bring_to_front(&mut self) -> bool {
        let result = self.session.bring_to_front();
        self.report(result)
    }

    pub fn send_to_back(&mut self) -> bool {
        let result = self.session.send_to_back();
        self.report(result)
    }

    pub fn get_selected_ids(&self) -> String {
        let ids: Vec<&str> = self.session.selection().iter().map(|id| id.as_str()).collect();
        serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
    }

    // ─── Crop ────────────────────────────────────────────────────────────

    pub fn start_crop(&mut self) -> bool {
        let result = self.session.start_crop();
        self.report(result)
    }

    pub fn apply_crop(&mut self) -> bool {
        let result = self.session.apply_crop().map(|_| ());
        self.report(result)
    }

    pub fn cancel_crop(&mut self) -> bool {
        let result = self.session.cancel_crop();
        self.report(result)
    }

    pub fn is_cropping(&self) -> bool {
        self.session.is_cropping()
    }

    // ─── View ────────────────────────────────────────────────────────────

    pub fn zoom_in(&mut self) -> f64 {
        self.session.zoom_in()
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.session.zoom_out()
    }

    pub fn zoom_reset(&mut self) -> f64 {
        self.session.zoom_reset();
        self.session.viewport().scale
    }

    pub fn get_zoom(&self) -> f64 {
        self.session.viewport().scale
    }

    // ─── Output ──────────────────────────────────────────────────────────

    /// PNG of the canvas content; empty if there is nothing to export.
    pub fn export_png(&mut self) -> Vec<u8> {
        let result = self.session.export_png();
        match result {
            Ok(png) => png,
            Err(e) => {
                self.report::<()>(Err(e));
                Vec::new()
            }
        }
    }

    /// Save the description. `upload` receives `(bytes, mime, filename)`
    /// and resolves to `{url, key, mime, size}`; `on_save` receives the
    /// content object. Resolves to `"structural"`, `"rasterized"` or
    /// `"minimal"`; rejects with a message for the user.
    pub fn save(&self, upload: js_sys::Function, on_save: js_sys::Function) -> js_sys::Promise {
        let plan = self.session.plan_save();
        wasm_bindgen_futures::future_to_promise(async move {
            let plan = plan.map_err(|e| JsValue::from_str(&e.to_string()))?;
            let outcome = persist::execute_save(plan, &JsUpload(upload), &JsSink(on_save))
                .await
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            Ok(JsValue::from_str(match outcome {
                SaveOutcome::Structural { .. } => "structural",
                SaveOutcome::Rasterized { .. } => "rasterized",
                SaveOutcome::Minimal => "minimal",
            }))
        })
    }

    /// Messages to show the user, as a JSON array of strings. Cleared on read.
    pub fn take_notices(&mut self) -> String {
        serde_json::to_string(&self.session.take_notices()).unwrap_or_else(|_| "[]".to_string())
    }
}

impl AnnotationCanvas {
    /// Route a refused or failed operation to the notice queue.
    fn report<T>(&mut self, result: Result<T, EditorError>) -> bool {
        match result {
            Ok(_) => true,
            Err(e) => {
                self.session.report(e);
                false
            }
        }
    }
}

// ─── Text ────────────────────────────────────────────────────────────────

fn draw_text(ctx: &CanvasRenderingContext2d, runs: &[TextRun]) -> Result<(), JsValue> {
    ctx.save();
    ctx.set_text_baseline("top");
    for run in runs {
        let [a, b, c, d, e, f] = run.transform;
        ctx.set_transform(a, b, c, d, e, f)?;
        ctx.set_global_alpha(run.opacity.clamp(0.0, 1.0));
        ctx.set_fill_style_str(&run.color.to_css());
        ctx.set_font(&format!("{}px {}", run.font_size, run.font_family));
        for (row, line) in run.lines.iter().enumerate() {
            ctx.fill_text(line, 0.0, line_top(row, run.font_size))?;
        }
    }
    ctx.restore();
    Ok(())
}

fn modifiers(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Modifiers {
    Modifiers {
        shift,
        ctrl,
        alt,
        meta,
    }
}

fn tool_from_name(name: &str) -> Option<ToolKind> {
    serde_json::from_value(serde_json::Value::String(name.to_ascii_lowercase())).ok()
}

fn tool_name(tool: ToolKind) -> String {
    match serde_json::to_value(tool) {
        Ok(serde_json::Value::String(name)) => name,
        _ => "select".to_string(),
    }
}

fn action_name(action: ShortcutAction) -> &'static str {
    match action {
        ShortcutAction::Tool(_) => "tool",
        ShortcutAction::Undo => "undo",
        ShortcutAction::Redo => "redo",
        ShortcutAction::Copy => "copy",
        ShortcutAction::Cut => "cut",
        ShortcutAction::Paste => "paste",
        ShortcutAction::Duplicate => "duplicate",
        ShortcutAction::Delete => "delete",
        ShortcutAction::BringToFront => "bring_to_front",
        ShortcutAction::SendToBack => "send_to_back",
        ShortcutAction::ZoomIn => "zoom_in",
        ShortcutAction::ZoomOut => "zoom_out",
        ShortcutAction::ZoomReset => "zoom_reset",
        ShortcutAction::PanStart => "pan",
        ShortcutAction::Cancel => "cancel",
        ShortcutAction::ApplyCrop => "apply_crop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tool_names_round_trip() {
        for tool in [
            ToolKind::Select,
            ToolKind::Draw,
            ToolKind::Text,
            ToolKind::Rect,
            ToolKind::Circle,
            ToolKind::Line,
            ToolKind::Arrow,
            ToolKind::Highlight,
            ToolKind::Image,
        ] {
            assert_eq!(tool_from_name(&tool_name(tool)), Some(tool));
        }
        assert_eq!(tool_from_name("Rect"), Some(ToolKind::Rect));
        assert_eq!(tool_from_name("lasso"), None);
    }

    #[test]
    fn action_names_are_snake_case() {
        assert_eq!(action_name(ShortcutAction::BringToFront), "bring_to_front");
        assert_eq!(action_name(ShortcutAction::Tool(ToolKind::Draw)), "tool");
    }
}

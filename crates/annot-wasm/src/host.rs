//! Browser-side implementations of the editor's host interfaces.

use annot_core::document::PersistedContent;
use annot_editor::loader::{ImageLoader, MemoryLoader};
use annot_editor::persist::{ContentSink, ServiceError, UploadResult, UploadService};
use annot_editor::settings::SettingsStore;
use annot_render::{DecodedImage, RenderError};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

// ─── Settings ────────────────────────────────────────────────────────────

/// Tool settings in `window.localStorage`.
pub struct LocalStorageStore(web_sys::Storage);

impl LocalStorageStore {
    pub fn open() -> Option<Self> {
        web_sys::window()?.local_storage().ok().flatten().map(Self)
    }
}

impl SettingsStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Err(e) = self.0.set_item(key, value) {
            log::warn!("could not store {key}: {}", describe(&e));
        }
    }
}

// ─── Images ──────────────────────────────────────────────────────────────

/// Image bytes fetched by the page, keyed by source URL. Data URIs decode
/// without being provided.
#[derive(Clone, Default)]
pub struct SharedLoader(Rc<RefCell<MemoryLoader>>);

impl SharedLoader {
    pub fn provide(&self, src: &str, bytes: Vec<u8>) {
        self.0.borrow_mut().provide(src, bytes);
    }

    pub fn fail(&self, src: &str, reason: &str) {
        self.0.borrow_mut().fail(src, reason);
    }
}

impl ImageLoader for SharedLoader {
    fn load(&mut self, src: &str) -> Result<DecodedImage, RenderError> {
        self.0.borrow_mut().load(src)
    }
}

// ─── Services ────────────────────────────────────────────────────────────

/// `(bytes: Uint8Array, mime: string, filename: string) => Promise<{url, key, mime, size}>`
pub struct JsUpload(pub js_sys::Function);

impl UploadService for JsUpload {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        filename: &str,
    ) -> Result<UploadResult, ServiceError> {
        let array = js_sys::Uint8Array::from(bytes.as_slice());
        let returned = self
            .0
            .call3(
                &JsValue::NULL,
                &array,
                &JsValue::from_str(mime),
                &JsValue::from_str(filename),
            )
            .map_err(service_error)?;
        let value = settle(returned).await?;
        let json: String = js_sys::JSON::stringify(&value)
            .map_err(service_error)?
            .into();
        serde_json::from_str(&json)
            .map_err(|e| ServiceError(format!("unexpected upload response: {e}")))
    }
}

/// `(content: object) => Promise<void>`, the page's `onSave`.
pub struct JsSink(pub js_sys::Function);

impl ContentSink for JsSink {
    async fn save(&self, content: PersistedContent) -> Result<(), ServiceError> {
        let json = content
            .to_json()
            .map_err(|e| ServiceError(e.to_string()))?;
        let value = js_sys::JSON::parse(&json).map_err(service_error)?;
        let returned = self.0.call1(&JsValue::NULL, &value).map_err(service_error)?;
        settle(returned).await?;
        Ok(())
    }
}

/// Await `value` if it is a promise; plain values resolve immediately.
async fn settle(value: JsValue) -> Result<JsValue, ServiceError> {
    JsFuture::from(js_sys::Promise::resolve(&value))
        .await
        .map_err(service_error)
}

fn service_error(value: JsValue) -> ServiceError {
    ServiceError(describe(&value))
}

fn describe(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return err.message().into();
    }
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

// ─── Logging ─────────────────────────────────────────────────────────────

/// Panic hook and console logging, installed once per page.
pub fn install_console() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("annot wasm panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
            if let Err(e) = console_log::init_with_level(log::Level::Info) {
                web_sys::console::warn_1(&format!("console logging unavailable: {e}").into());
            }
        });
    }
}

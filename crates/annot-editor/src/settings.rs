//! Sticky tool settings.
//!
//! The active tool, brush color/width and text font survive page reloads.
//! Each value is stored JSON-encoded under its own `canvas-editor-<key>` key
//! so a single corrupt entry only resets that one setting.

use crate::tools::ToolKind;
use annot_core::Color;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const STORAGE_PREFIX: &str = "canvas-editor-";

/// Key/value persistence for settings (browser `localStorage`, or memory).
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory store for native hosts and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Names of the individual stored settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Tool,
    DrawingColor,
    DrawingWidth,
    FontFamily,
    FontSize,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::Tool,
        SettingKey::DrawingColor,
        SettingKey::DrawingWidth,
        SettingKey::FontFamily,
        SettingKey::FontSize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SettingKey::Tool => "tool",
            SettingKey::DrawingColor => "drawingColor",
            SettingKey::DrawingWidth => "drawingWidth",
            SettingKey::FontFamily => "fontFamily",
            SettingKey::FontSize => "fontSize",
        }
    }

    pub fn storage_key(&self) -> String {
        format!("{STORAGE_PREFIX}{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    pub tool: ToolKind,
    pub drawing_color: Color,
    pub drawing_width: f64,
    pub font_family: String,
    pub font_size: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: ToolKind::Select,
            drawing_color: Color::BLACK,
            drawing_width: 2.0,
            font_family: "Arial".to_string(),
            font_size: 20.0,
        }
    }
}

fn read<T: DeserializeOwned>(store: &dyn SettingsStore, key: SettingKey) -> Option<T> {
    let raw = store.get(&key.storage_key())?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("ignoring stored {}: {e}", key.name());
            None
        }
    }
}

impl ToolSettings {
    /// Load every setting, falling back to the default for any that are
    /// missing or unreadable.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let d = Self::default();
        Self {
            tool: read(store, SettingKey::Tool).unwrap_or(d.tool),
            drawing_color: read(store, SettingKey::DrawingColor).unwrap_or(d.drawing_color),
            drawing_width: read::<f64>(store, SettingKey::DrawingWidth)
                .filter(|w| *w > 0.0)
                .unwrap_or(d.drawing_width),
            font_family: read(store, SettingKey::FontFamily).unwrap_or(d.font_family),
            font_size: read::<f64>(store, SettingKey::FontSize)
                .filter(|s| *s > 0.0)
                .unwrap_or(d.font_size),
        }
    }

    pub fn save(&self, store: &mut dyn SettingsStore, key: SettingKey) {
        let encoded = match key {
            SettingKey::Tool => serde_json::to_string(&self.tool),
            SettingKey::DrawingColor => serde_json::to_string(&self.drawing_color),
            SettingKey::DrawingWidth => serde_json::to_string(&self.drawing_width),
            SettingKey::FontFamily => serde_json::to_string(&self.font_family),
            SettingKey::FontSize => serde_json::to_string(&self.font_size),
        };
        match encoded {
            Ok(value) => store.set(&key.storage_key(), &value),
            Err(e) => log::warn!("could not store {}: {e}", key.name()),
        }
    }

    pub fn save_all(&self, store: &mut dyn SettingsStore) {
        for key in SettingKey::ALL {
            self.save(store, key);
        }
    }
}

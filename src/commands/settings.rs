use serde::{Deserialize, Serialize};

use crate::commands::store;
use crate::error::Result;

const SETTINGS_KEY: &str = "settings";

/// Appearance preferences for the host page and the editors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub page_theme: String,
    pub editor_theme: String,
    pub editor_font_size: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            page_theme: "light".into(),
            editor_theme: "default".into(),
            editor_font_size: 14,
        }
    }
}

/// Falls open to defaults when nothing was saved yet or the stored value
/// is unreadable.
#[tauri::command]
pub async fn load_settings() -> Result<EditorSettings> {
    Ok(store::read_key(SETTINGS_KEY).unwrap_or_default())
}

#[tauri::command]
pub async fn save_settings(settings: EditorSettings) -> Result<()> {
    store::write_key(SETTINGS_KEY, &settings)
}

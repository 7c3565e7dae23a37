use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Ordered lists of external stylesheet/script URLs injected into every
/// render. Load order matters: external resources always precede user
/// source in the built document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub external_css_urls: Vec<String>,
    pub external_js_urls: Vec<String>,
}

impl ResourceConfig {
    /// Builds a configuration from raw URL lists, trimming entries and
    /// dropping blank lines while preserving order.
    pub fn normalized(css_urls: Vec<String>, js_urls: Vec<String>) -> Self {
        Self {
            external_css_urls: normalize_urls(css_urls),
            external_js_urls: normalize_urls(js_urls),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.external_css_urls.is_empty() && self.external_js_urls.is_empty()
    }
}

fn normalize_urls(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

/// Managed Tauri state for the editing session: the active project id and
/// the current resource configuration. Mutated only through commands, read
/// as a fresh snapshot at render time.
#[derive(Default)]
pub struct SessionState {
    active_project: Mutex<Option<String>>,
    resources: Mutex<ResourceConfig>,
}

impl SessionState {
    pub async fn active_project(&self) -> Option<String> {
        self.active_project.lock().await.clone()
    }

    pub async fn set_active_project(&self, id: Option<String>) {
        *self.active_project.lock().await = id;
    }

    pub async fn resources_snapshot(&self) -> ResourceConfig {
        self.resources.lock().await.clone()
    }

    pub async fn set_resources(&self, resources: ResourceConfig) {
        *self.resources.lock().await = resources;
    }
}

/// Replaces the session's external resource lists. Raw textarea lines come
/// in as-is; normalization happens here so every consumer sees clean URLs.
#[tauri::command]
pub async fn update_resources(
    css_urls: Vec<String>,
    js_urls: Vec<String>,
    state: tauri::State<'_, SessionState>,
) -> crate::error::Result<ResourceConfig> {
    let resources = ResourceConfig::normalized(css_urls, js_urls);
    state.set_resources(resources.clone()).await;
    Ok(resources)
}

#[tauri::command]
pub async fn get_resources(
    state: tauri::State<'_, SessionState>,
) -> crate::error::Result<ResourceConfig> {
    Ok(state.resources_snapshot().await)
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::commands::store;
use crate::error::{PlaygroundError, Result};

const WORKSPACE_KEY: &str = "workspace";
const COALESCE_WINDOW_MS: u64 = 1200;

/// In-progress, unsaved editor state. Persisted in the background so a
/// crash or accidental close loses at most one coalescing window of edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub html_source: String,
    pub css_source: String,
    pub js_source: String,
    pub external_css_urls: Vec<String>,
    pub external_js_urls: Vec<String>,
    pub active_project_id: Option<String>,
}

/// Coalescing write scheduler: every snapshot queued inside the window
/// replaces the pending one, and a single write of the latest happens at
/// the window's end. Queueing re-arms the cancellable delayed task.
pub struct WriteCoalescer {
    pending: Arc<std::sync::Mutex<Option<WorkspaceSnapshot>>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    window: Duration,
}

impl WriteCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Arc::new(std::sync::Mutex::new(None)),
            timer: Arc::new(Mutex::new(None)),
            window,
        }
    }

    pub async fn queue(&self, snapshot: WorkspaceSnapshot, dir: PathBuf) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(snapshot);
        }

        let mut timer = self.timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let pending = self.pending.clone();
        let window = self.window;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let snapshot = pending.lock().ok().and_then(|mut guard| guard.take());
            if let Some(snapshot) = snapshot {
                let _ = store::write_key_in(&dir, WORKSPACE_KEY, &snapshot);
            }
        }));
    }

    /// Writes whatever is still pending, immediately and synchronously.
    /// Used from the window close handler; an armed timer that fires later
    /// finds nothing pending and does not write again.
    pub fn flush_sync(&self, dir: &Path) {
        if let Ok(mut guard) = self.pending.lock() {
            if let Some(snapshot) = guard.take() {
                let _ = store::write_key_in(dir, WORKSPACE_KEY, &snapshot);
            }
        }
    }
}

/// Managed Tauri state wrapping the coalescer with the app's storage root.
pub struct AutosaveState {
    coalescer: WriteCoalescer,
}

impl Default for AutosaveState {
    fn default() -> Self {
        Self {
            coalescer: WriteCoalescer::new(Duration::from_millis(COALESCE_WINDOW_MS)),
        }
    }
}

impl AutosaveState {
    pub fn flush_sync(&self) {
        if let Some(dir) = store::data_dir() {
            self.coalescer.flush_sync(&dir);
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Records the latest editor state for background persistence. Called on
/// every edit; the coalescer collapses bursts into one disk write.
#[tauri::command]
pub async fn queue_workspace_save(
    snapshot: WorkspaceSnapshot,
    state: tauri::State<'_, AutosaveState>,
) -> Result<()> {
    let dir = store::data_dir()
        .ok_or_else(|| PlaygroundError::Custom("Cannot find home directory".into()))?;
    state.coalescer.queue(snapshot, dir).await;
    Ok(())
}

/// The last autosaved workspace, if any survives from a prior session.
#[tauri::command]
pub async fn load_workspace() -> Result<Option<WorkspaceSnapshot>> {
    Ok(store::read_key(WORKSPACE_KEY))
}

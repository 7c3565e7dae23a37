use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::commands::session::{ResourceConfig, SessionState};
use crate::commands::store;
use crate::error::{PlaygroundError, Result};
use crate::templates;

const PROJECTS_KEY: &str = "projects";

/// A saved snapshot of the three editors plus the resource configuration.
/// `id` is immutable once assigned; every save replaces the whole record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub html_source: String,
    pub css_source: String,
    pub js_source: String,
    pub external_css_urls: Vec<String>,
    pub external_js_urls: Vec<String>,
    /// Unix milliseconds at save time; listings sort on this, newest first.
    pub saved_at: u64,
}

/// What the frontend sends on save: a name and the current editor text.
/// The resource configuration is taken from the session, not the draft.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    pub html_source: String,
    pub css_source: String,
    pub js_source: String,
}

/// Placeholder editor contents, handed back when the active project is
/// deleted so the frontend can reset.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultContent {
    pub html_source: String,
    pub css_source: String,
    pub js_source: String,
}

impl DefaultContent {
    fn placeholder() -> Self {
        Self {
            html_source: templates::default_html().to_string(),
            css_source: templates::default_css().to_string(),
            js_source: templates::default_js().to_string(),
        }
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub projects: Vec<Project>,
    /// Present only when the deleted project was the active one.
    pub reset_content: Option<DefaultContent>,
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn all_projects() -> Vec<Project> {
    store::read_key(PROJECTS_KEY).unwrap_or_default()
}

fn sorted_recent_first(mut projects: Vec<Project>) -> Vec<Project> {
    projects.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
    projects
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Applies one save to the in-memory list. Overwrites the active record in
/// place on a plain save; mints a fresh id (time-ordered, random tie-break)
/// for "save as" or when no project is active. A blank name aborts with no
/// state change.
fn save_into(
    projects: &mut Vec<Project>,
    draft: &ProjectDraft,
    resources: &ResourceConfig,
    active_id: Option<&str>,
    save_as: bool,
    saved_at: u64,
) -> Result<Project> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(PlaygroundError::Validation(
            "A project needs a name before it can be saved.".into(),
        ));
    }

    let reuse_id = if save_as { None } else { active_id };
    let id = reuse_id
        .map(str::to_string)
        .unwrap_or_else(|| Ulid::new().to_string());

    let project = Project {
        id: id.clone(),
        name: name.to_string(),
        html_source: draft.html_source.clone(),
        css_source: draft.css_source.clone(),
        js_source: draft.js_source.clone(),
        external_css_urls: resources.external_css_urls.clone(),
        external_js_urls: resources.external_js_urls.clone(),
        saved_at,
    };

    match projects.iter_mut().find(|p| p.id == id) {
        Some(existing) => *existing = project.clone(),
        // A vanished active record just becomes a new entry under its old id
        None => projects.push(project.clone()),
    }

    Ok(project)
}

fn remove_from(projects: &mut Vec<Project>, id: &str) -> bool {
    let before = projects.len();
    projects.retain(|p| p.id != id);
    projects.len() != before
}

// ── Commands ────────────────────────────────────────────────────────────────

/// All saved projects, most recently saved first.
#[tauri::command]
pub async fn list_projects() -> Result<Vec<Project>> {
    Ok(sorted_recent_first(all_projects()))
}

/// The placeholder editor contents, for first run.
#[tauri::command]
pub async fn default_content() -> Result<DefaultContent> {
    Ok(DefaultContent::placeholder())
}

/// Saves the current editors under a name. `save_as` forces a new record
/// even when a project is active.
#[tauri::command]
pub async fn save_project(
    draft: ProjectDraft,
    save_as: bool,
    session: tauri::State<'_, SessionState>,
) -> Result<Project> {
    let resources = session.resources_snapshot().await;
    let active = session.active_project().await;

    let mut projects = all_projects();
    let project = save_into(
        &mut projects,
        &draft,
        &resources,
        active.as_deref(),
        save_as,
        now_millis(),
    )?;

    store::write_key(PROJECTS_KEY, &projects)?;
    session.set_active_project(Some(project.id.clone())).await;
    Ok(project)
}

/// Looks a project up by id, marks it active and installs its resource
/// configuration. A vanished id reports not-found and leaves the current
/// editor state untouched.
#[tauri::command]
pub async fn load_project(
    id: String,
    session: tauri::State<'_, SessionState>,
) -> Result<Project> {
    let project = all_projects()
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| PlaygroundError::NotFound("That project no longer exists.".into()))?;

    session.set_active_project(Some(project.id.clone())).await;
    session
        .set_resources(ResourceConfig {
            external_css_urls: project.external_css_urls.clone(),
            external_js_urls: project.external_js_urls.clone(),
        })
        .await;

    Ok(project)
}

/// Removes a project. Confirmation happens in the frontend dialog before
/// this is invoked. Deleting the active project clears the active marker
/// and returns placeholder content for the editors.
#[tauri::command]
pub async fn delete_project(
    id: String,
    session: tauri::State<'_, SessionState>,
) -> Result<DeleteOutcome> {
    let mut projects = all_projects();
    if !remove_from(&mut projects, &id) {
        return Err(PlaygroundError::NotFound("That project no longer exists.".into()));
    }
    store::write_key(PROJECTS_KEY, &projects)?;

    let was_active = session.active_project().await.as_deref() == Some(id.as_str());
    let reset_content = if was_active {
        session.set_active_project(None).await;
        Some(DefaultContent::placeholder())
    } else {
        None
    };

    Ok(DeleteOutcome {
        projects: sorted_recent_first(projects),
        reset_content,
    })
}

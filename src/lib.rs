use tauri::Manager;

mod commands;
mod error;
mod templates;

pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .manage(commands::session::SessionState::default())
        .manage(commands::console::ConsoleBridgeState::default())
        .manage(commands::autosave::AutosaveState::default())
        .manage(commands::logbook::LogbookState::default())
        .invoke_handler(tauri::generate_handler![
            commands::projects::list_projects,
            commands::projects::default_content,
            commands::projects::save_project,
            commands::projects::load_project,
            commands::projects::delete_project,
            commands::preview::render_preview,
            commands::console::start_console_bridge,
            commands::console::stop_console_bridge,
            commands::console::clear_console,
            commands::console::get_console_entries,
            commands::session::update_resources,
            commands::session::get_resources,
            commands::settings::load_settings,
            commands::settings::save_settings,
            commands::autosave::queue_workspace_save,
            commands::autosave::load_workspace,
            commands::export::export_archive,
            commands::assistant::ask_assistant,
        ])
        .on_window_event(|_window, event| {
            if let tauri::WindowEvent::Destroyed = event {
                // Stop the console bridge server when the window is closed
                if let Some(state) = _window.try_state::<commands::console::ConsoleBridgeState>() {
                    state.inner().kill_sync();
                }
                // Flush any pending workspace autosave so edits are not lost
                if let Some(state) = _window.try_state::<commands::autosave::AutosaveState>() {
                    state.inner().flush_sync();
                }
            }
        })
        .run(tauri::generate_context!())
        .expect("failed to run Alexr Code")
}

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tauri::ipc::Channel;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::commands::logbook::{self, LogbookState};
use crate::error::{PlaygroundError, Result};

/// Fixed local port the preview bootstrap posts diagnostics to.
pub const BRIDGE_PORT: u16 = 17893;

// ── Model ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// One raw event reported by the preview bootstrap script.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEvent {
    pub seq: u64,
    pub severity: Severity,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// True when this came from `window.onerror` rather than a console call.
    #[serde(default)]
    pub uncaught: bool,
    /// Resource URL reported with an uncaught error, when the context had one.
    #[serde(default)]
    pub source: Option<String>,
}

/// A batch of events tagged with the render token they belong to.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticBatch {
    pub token: u64,
    pub entries: Vec<DiagnosticEvent>,
}

/// A formatted line in the host console panel.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    pub severity: Severity,
    pub rendered_text: String,
    pub sequence_index: u64,
}

/// Events streamed from Rust to the console panel via Channel.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum ConsoleEvent {
    #[serde(rename_all = "camelCase")]
    Entry { entry: ConsoleEntry },
    Cleared,
}

// ── Panel buffer ────────────────────────────────────────────────────────────

/// Append-only panel content for the current render cycle.
///
/// Batches can arrive over separate connections in any order; events are
/// held back until every lower sequence number has been released, so the
/// panel always matches the exact order calls occurred in the preview.
/// Events carrying a stale render token are dropped outright — entries
/// from two renders never interleave.
#[derive(Default)]
struct PanelBuffer {
    generation: u64,
    next_seq: u64,
    entries: Vec<ConsoleEntry>,
    pending: BTreeMap<u64, DiagnosticEvent>,
}

impl PanelBuffer {
    /// Starts a new render cycle: empties the panel, forgets held-back
    /// events, and returns the new token.
    fn begin_cycle(&mut self) -> u64 {
        self.generation += 1;
        self.next_seq = 0;
        self.entries.clear();
        self.pending.clear();
        self.generation
    }

    /// Empties the panel without ending the cycle.
    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Accepts a batch and returns the entries released in order.
    fn ingest(&mut self, batch: DiagnosticBatch) -> Vec<ConsoleEntry> {
        if batch.token != self.generation {
            return Vec::new();
        }

        for event in batch.entries {
            if event.seq >= self.next_seq {
                self.pending.insert(event.seq, event);
            }
        }

        let mut released = Vec::new();
        while let Some(event) = self.pending.remove(&self.next_seq) {
            let entry = ConsoleEntry {
                severity: event.severity,
                rendered_text: render_event(&event),
                sequence_index: event.seq,
            };
            self.next_seq += 1;
            self.entries.push(entry.clone());
            released.push(entry);
        }
        released
    }
}

// ── Formatting ──────────────────────────────────────────────────────────────

/// Renders one diagnostic event into the panel's display string.
fn render_event(event: &DiagnosticEvent) -> String {
    if event.uncaught {
        let message = event
            .args
            .first()
            .map(format_value)
            .unwrap_or_else(|| "Uncaught error".to_string());
        return format!("{message} ({})", source_label(event.source.as_deref()));
    }

    event
        .args
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stringifies one console argument. Plain strings and numbers pass
/// through; Error markers render as message plus trace; everything else is
/// pretty-printed JSON (functions were already replaced by a placeholder
/// in the preview context).
fn format_value(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) if map.get("__error").and_then(Value::as_bool).unwrap_or(false) => {
            let message = map.get("message").and_then(Value::as_str).unwrap_or("Error");
            match map.get("stack").and_then(Value::as_str) {
                Some(stack) => format!("{message}\n{stack}"),
                None => message.to_string(),
            }
        }
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Best-effort source label for an uncaught error: the file name component
/// of the reporting resource path, or "inline script" when the error came
/// from the document itself.
fn source_label(source: Option<&str>) -> String {
    match source {
        Some(path) if !path.trim().is_empty() && path != "about:srcdoc" => path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(path)
            .to_string(),
        _ => "inline script".to_string(),
    }
}

// ── State ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ConsoleBridgeState {
    buffer: Arc<Mutex<PanelBuffer>>,
    on_event: Arc<Mutex<Option<Channel<ConsoleEvent>>>>,
    server: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConsoleBridgeState {
    /// Begins a new render cycle and notifies the panel to clear.
    pub async fn begin_cycle(&self) -> u64 {
        let token = self.buffer.lock().await.begin_cycle();
        send_event(&self.on_event, ConsoleEvent::Cleared).await;
        token
    }

    /// Abort the server task synchronously (for the window close handler).
    pub fn kill_sync(&self) {
        if let Ok(mut guard) = self.server.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

async fn send_event(
    channel: &Arc<Mutex<Option<Channel<ConsoleEvent>>>>,
    event: ConsoleEvent,
) {
    if let Some(channel) = channel.lock().await.as_ref() {
        let _ = channel.send(event);
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Starts the diagnostics listener on 127.0.0.1 and registers the panel
/// channel. Idempotent: a second call just swaps the channel.
#[tauri::command]
pub async fn start_console_bridge(
    on_event: Channel<ConsoleEvent>,
    state: tauri::State<'_, ConsoleBridgeState>,
    logbook: tauri::State<'_, LogbookState>,
) -> Result<u16> {
    *state.on_event.lock().await = Some(on_event);

    let mut server = state.server.lock().await;
    if server.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
        return Ok(BRIDGE_PORT);
    }

    let log_tx = logbook.ensure_started().await;

    let listener = TcpListener::bind(("127.0.0.1", BRIDGE_PORT))
        .await
        .map_err(|e| {
            PlaygroundError::Custom(format!("Cannot start console bridge on port {BRIDGE_PORT}: {e}"))
        })?;

    let buffer = state.buffer.clone();
    let channel = state.on_event.clone();

    let handle = tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => continue,
            };

            let buffer = buffer.clone();
            let channel = channel.clone();
            let log_tx = log_tx.clone();
            tokio::spawn(async move {
                handle_connection(stream, buffer, channel, log_tx).await;
            });
        }
    });

    *server = Some(handle);
    Ok(BRIDGE_PORT)
}

#[tauri::command]
pub async fn stop_console_bridge(state: tauri::State<'_, ConsoleBridgeState>) -> Result<()> {
    if let Some(handle) = state.server.lock().await.take() {
        handle.abort();
    }
    Ok(())
}

/// Removes every entry from the panel unconditionally.
#[tauri::command]
pub async fn clear_console(state: tauri::State<'_, ConsoleBridgeState>) -> Result<()> {
    state.buffer.lock().await.clear();
    send_event(&state.on_event, ConsoleEvent::Cleared).await;
    Ok(())
}

#[tauri::command]
pub async fn get_console_entries(
    state: tauri::State<'_, ConsoleBridgeState>,
) -> Result<Vec<ConsoleEntry>> {
    Ok(state.buffer.lock().await.entries.clone())
}

// ── Server ──────────────────────────────────────────────────────────────────

/// Handles a single connection with minimal HTTP parsing:
/// - `GET /health` → `200 ok`
/// - `POST /console` → JSON `DiagnosticBatch`
/// - `OPTIONS` → CORS preflight (the preview frame is a different origin)
async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    buffer: Arc<Mutex<PanelBuffer>>,
    channel: Arc<Mutex<Option<Channel<ConsoleEvent>>>>,
    log_tx: Option<mpsc::UnboundedSender<String>>,
) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut raw: Vec<u8> = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    // Read until the headers are complete, then until Content-Length bytes
    // of body have arrived. Console batches can exceed a single read.
    let (head_end, body_len) = loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        raw.extend_from_slice(&chunk[..n]);

        if let Some(pos) = find_header_end(&raw) {
            let head = String::from_utf8_lossy(&raw[..pos]);
            break (pos + 4, content_length(&head));
        }
        if raw.len() > 1 << 20 {
            return;
        }
    };

    while raw.len() < head_end + body_len {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        raw.extend_from_slice(&chunk[..n]);
    }

    let request = String::from_utf8_lossy(&raw);
    let first_line = request.lines().next().unwrap_or("");

    if first_line.starts_with("GET /health") {
        let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\nAccess-Control-Allow-Origin: *\r\n\r\nok";
        let _ = stream.write_all(response.as_bytes()).await;
        return;
    }

    if first_line.starts_with("POST /console") {
        let body = &raw[head_end.min(raw.len())..];
        process_batch(&buffer, &channel, &log_tx, body).await;
        let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\nAccess-Control-Allow-Origin: *\r\n\r\nok";
        let _ = stream.write_all(response.as_bytes()).await;
        return;
    }

    if first_line.starts_with("OPTIONS") {
        let response = "HTTP/1.1 204 No Content\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET, POST, OPTIONS\r\nAccess-Control-Allow-Headers: Content-Type\r\nConnection: close\r\n\r\n";
        let _ = stream.write_all(response.as_bytes()).await;
        return;
    }

    let response = "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found";
    let _ = stream.write_all(response.as_bytes()).await;
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

/// Parses a diagnostics batch, releases whatever is now in order, and
/// forwards each released entry to the panel and the session log.
async fn process_batch(
    buffer: &Arc<Mutex<PanelBuffer>>,
    channel: &Arc<Mutex<Option<Channel<ConsoleEvent>>>>,
    log_tx: &Option<mpsc::UnboundedSender<String>>,
    body: &[u8],
) {
    let batch: DiagnosticBatch = match serde_json::from_slice(body) {
        Ok(b) => b,
        Err(_) => return,
    };

    let released = buffer.lock().await.ingest(batch);
    for entry in released {
        if let Some(tx) = log_tx {
            logbook::send_line(tx, "preview", &entry.rendered_text);
        }
        send_event(channel, ConsoleEvent::Entry { entry }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(seq: u64, severity: Severity, args: Vec<serde_json::Value>) -> DiagnosticEvent {
        DiagnosticEvent {
            seq,
            severity,
            args,
            uncaught: false,
            source: None,
        }
    }

    fn batch(token: u64, entries: Vec<DiagnosticEvent>) -> DiagnosticBatch {
        DiagnosticBatch { token, entries }
    }

    #[test]
    fn entries_are_released_in_call_order() {
        let mut panel = PanelBuffer::default();
        let token = panel.begin_cycle();

        let released = panel.ingest(batch(
            token,
            vec![
                event(0, Severity::Log, vec![json!("first")]),
                event(1, Severity::Warn, vec![json!("second")]),
            ],
        ));

        assert_eq!(released.len(), 2);
        assert_eq!(released[0].rendered_text, "first");
        assert_eq!(released[0].severity, Severity::Log);
        assert_eq!(released[1].rendered_text, "second");
        assert_eq!(released[1].severity, Severity::Warn);
    }

    #[test]
    fn out_of_order_batches_are_held_back() {
        let mut panel = PanelBuffer::default();
        let token = panel.begin_cycle();

        // The later batch arrives first
        let released = panel.ingest(batch(
            token,
            vec![event(1, Severity::Log, vec![json!("second")])],
        ));
        assert!(released.is_empty());

        // Once seq 0 lands, both are released, in order
        let released = panel.ingest(batch(
            token,
            vec![event(0, Severity::Log, vec![json!("first")])],
        ));
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].sequence_index, 0);
        assert_eq!(released[1].sequence_index, 1);
        assert_eq!(panel.entries.len(), 2);
    }

    #[test]
    fn stale_token_events_are_dropped() {
        let mut panel = PanelBuffer::default();
        let old = panel.begin_cycle();
        let current = panel.begin_cycle();
        assert_ne!(old, current);

        let released = panel.ingest(batch(old, vec![event(0, Severity::Log, vec![json!("x")])]));
        assert!(released.is_empty());
        assert!(panel.entries.is_empty());

        let released = panel.ingest(batch(
            current,
            vec![event(0, Severity::Log, vec![json!("y")])],
        ));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].rendered_text, "y");
    }

    #[test]
    fn new_cycle_discards_panel_and_pending() {
        let mut panel = PanelBuffer::default();
        let token = panel.begin_cycle();
        panel.ingest(batch(token, vec![event(0, Severity::Log, vec![json!("a")])]));
        // seq 2 stays pending (seq 1 never arrives)
        panel.ingest(batch(token, vec![event(2, Severity::Log, vec![json!("c")])]));

        panel.begin_cycle();
        assert!(panel.entries.is_empty());
        assert!(panel.pending.is_empty());
        assert_eq!(panel.next_seq, 0);
    }

    #[test]
    fn clear_keeps_the_cycle_running() {
        let mut panel = PanelBuffer::default();
        let token = panel.begin_cycle();
        panel.ingest(batch(token, vec![event(0, Severity::Log, vec![json!("a")])]));

        panel.clear();
        assert!(panel.entries.is_empty());

        let released = panel.ingest(batch(token, vec![event(1, Severity::Log, vec![json!("b")])]));
        assert_eq!(released.len(), 1);
    }

    #[test]
    fn multiple_arguments_join_with_a_single_space() {
        let entry = render_event(&event(
            0,
            Severity::Log,
            vec![json!("count:"), json!(3), json!(true)],
        ));
        assert_eq!(entry, "count: 3 true");
    }

    #[test]
    fn objects_render_pretty_printed() {
        let text = render_event(&event(0, Severity::Log, vec![json!({"a": 1})]));
        assert!(text.contains("\"a\": 1"));
    }

    #[test]
    fn error_markers_render_message_and_trace() {
        let text = render_event(&event(
            0,
            Severity::Error,
            vec![json!({"__error": true, "message": "boom", "stack": "at line 1"})],
        ));
        assert_eq!(text, "boom\nat line 1");
    }

    #[test]
    fn uncaught_error_gets_file_name_suffix() {
        let mut e = event(0, Severity::Error, vec![json!("undefinedFn is not defined")]);
        e.uncaught = true;
        e.source = Some("https://cdn.example/js/vendor.min.js".into());
        assert_eq!(
            render_event(&e),
            "undefinedFn is not defined (vendor.min.js)"
        );
    }

    #[test]
    fn uncaught_error_without_path_marks_inline_script() {
        let mut e = event(0, Severity::Error, vec![json!("boom")]);
        e.uncaught = true;
        e.source = None;
        assert_eq!(render_event(&e), "boom (inline script)");

        e.source = Some("about:srcdoc".into());
        assert_eq!(render_event(&e), "boom (inline script)");
    }

    #[test]
    fn content_length_parsing_is_case_insensitive() {
        let head = "POST /console HTTP/1.1\r\ncontent-length: 42\r\nHost: x";
        assert_eq!(content_length(head), 42);
        assert_eq!(content_length("GET / HTTP/1.1\r\nHost: x"), 0);
    }
}

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::commands::store;

const MAX_KEPT_SESSIONS: usize = 5;

/// Managed Tauri state holding the current session log (if any).
#[derive(Default)]
pub struct LogbookState {
    log: Arc<Mutex<Option<SessionLog>>>,
}

impl LogbookState {
    /// Initializes the session log on first use. Returns a cloned sender so
    /// background tasks can log without holding the state lock.
    pub async fn ensure_started(&self) -> Option<mpsc::UnboundedSender<String>> {
        let mut guard = self.log.lock().await;
        if guard.is_none() {
            *guard = SessionLog::new().await;
        }
        guard.as_ref().map(|l| l.sender())
    }

    pub async fn log(&self, prefix: &str, line: &str) {
        if let Some(log) = self.log.lock().await.as_ref() {
            log.log(prefix, line);
        }
    }
}

/// Async session logger writing timestamped lines to
/// `~/.alexr-code/logs/latest.log`.
///
/// `log()` only sends through an mpsc channel; a background task does the
/// disk writes, so callers never block on I/O.
pub struct SessionLog {
    tx: mpsc::UnboundedSender<String>,
}

impl SessionLog {
    /// Creates the log directory if needed, rotates the previous
    /// `latest.log` into `session-{timestamp}.log`, prunes old sessions,
    /// and spawns the writer task.
    pub async fn new() -> Option<Self> {
        let logs_dir = store::data_dir()?.join("logs");

        if tokio::fs::create_dir_all(&logs_dir).await.is_err() {
            return None;
        }

        let latest = logs_dir.join("latest.log");
        if latest.exists() {
            let rotated = logs_dir.join(format!("session-{}.log", unix_timestamp()));
            let _ = tokio::fs::rename(&latest, &rotated).await;
        }

        prune_old_sessions(&logs_dir).await;

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&latest)
            .await
        {
            Ok(f) => f,
            Err(_) => return None,
        };

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(writer_task(file, rx));

        let _ = tx.send(format!(
            "=== Alexr Code session — {} ===\n",
            format_timestamp(unix_timestamp())
        ));

        Some(Self { tx })
    }

    /// Queues a log line. Never blocks.
    pub fn log(&self, prefix: &str, line: &str) {
        send_line(&self.tx, prefix, line);
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.tx.clone()
    }
}

/// Formats and queues a line through a cloned sender.
pub fn send_line(tx: &mpsc::UnboundedSender<String>, prefix: &str, line: &str) {
    let ts = format_timestamp(unix_timestamp());
    let _ = tx.send(format!("[{ts}] [{prefix}] {line}\n"));
}

async fn writer_task(file: tokio::fs::File, mut rx: mpsc::UnboundedReceiver<String>) {
    use tokio::io::AsyncWriteExt;
    let mut writer = tokio::io::BufWriter::new(file);

    while let Some(line) = rx.recv().await {
        let _ = writer.write_all(line.as_bytes()).await;
        // Flush per line so the log is readable while the app runs
        let _ = writer.flush().await;
    }

    let _ = writer.flush().await;
}

/// Keeps only the most recent `session-*.log` files.
async fn prune_old_sessions(logs_dir: &Path) {
    let mut rd = match tokio::fs::read_dir(logs_dir).await {
        Ok(rd) => rd,
        Err(_) => return,
    };

    let mut sessions: Vec<std::path::PathBuf> = Vec::new();
    while let Ok(Some(entry)) = rd.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("session-") && name.ends_with(".log") {
            sessions.push(entry.path());
        }
    }

    // Timestamps embed in the names, so lexicographic order is chronological
    sessions.sort();
    while sessions.len() > MAX_KEPT_SESSIONS {
        let oldest = sessions.remove(0);
        let _ = tokio::fs::remove_file(oldest).await;
    }
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Formats a Unix timestamp as ISO 8601 UTC without a date/time dependency.
fn format_timestamp(secs: u64) -> String {
    let s = secs as i64;
    let (sec, min, hour) = (s % 60, (s / 60) % 60, (s / 3600) % 24);
    let (year, month, day) = civil_date(s / 86400);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}

/// Converts days since the Unix epoch into a (year, month, day) triple.
fn civil_date(mut days: i64) -> (i64, i64, i64) {
    let mut year: i64 = 1970;
    loop {
        let len = if is_leap(year) { 366 } else { 365 };
        if days < len {
            break;
        }
        days -= len;
        year += 1;
    }

    const MONTH_DAYS: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month: i64 = 1;
    for (i, base) in MONTH_DAYS.iter().enumerate() {
        let len = base + if i == 1 && is_leap(year) { 1 } else { 0 };
        if days < len {
            break;
        }
        days -= len;
        month += 1;
    }

    (year, month, days + 1)
}

fn is_leap(y: i64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

//! Append-only activity logging.
//!
//! The engine receives a `LogSink` at construction and writes one line per
//! state transition and recognition result. Write failures are swallowed;
//! losing a log line must never abort a cycle.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Destination for timestamped activity lines.
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str);
}

/// Logs to a text file with timestamps, echoing each line to stdout.
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LogSink for FileLog {
    fn append(&self, msg: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{}] {}\n", timestamp, msg);
        print!("{}", line);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Discards everything. Used by tests.
pub struct NullLog;

impl LogSink for NullLog {
    fn append(&self, _msg: &str) {}
}

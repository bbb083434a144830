//! Operator-facing status notifications.
//!
//! The engine emits a stream of `StatusEvent`s through an injected
//! `StatusSink`; only the latest event matters. Sinks are called from the
//! worker thread and must marshal to a presentation thread themselves if
//! they need one.

/// One status update. `progress_percent` is set for timed-window ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub text: String,
    pub progress_percent: Option<f32>,
}

impl StatusEvent {
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            progress_percent: None,
        }
    }

    pub fn progress(percent: f32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            progress_percent: Some(percent),
        }
    }
}

/// Consumer of engine status and progress updates. Must not block.
pub trait StatusSink: Send + Sync {
    fn on_status(&self, text: &str);
    fn on_progress(&self, percent: f32, text: &str);
}

/// Prints status lines to stdout.
pub struct ConsoleStatus;

impl StatusSink for ConsoleStatus {
    fn on_status(&self, text: &str) {
        println!("status: {}", text);
    }

    fn on_progress(&self, percent: f32, text: &str) {
        println!("[{:5.1}%] {}", percent, text);
    }
}

/// Records every event for assertions. Shared by engine tests.
#[cfg(test)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<StatusEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.snapshot()
            .iter()
            .filter(|e| e.text.contains(needle))
            .count()
    }
}

#[cfg(test)]
impl StatusSink for RecordingSink {
    fn on_status(&self, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::status(text));
    }

    fn on_progress(&self, percent: f32, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::progress(percent, text));
    }
}

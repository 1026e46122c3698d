use std::sync::mpsc::Sender;

use super::error::LoggerError;

/// The write-only handle to a `Logger`.
///
/// Cheap to clone and hand to worker threads. When logging is disabled
/// (`-l` not passed) a `LoggerSender` still exists but holds no channel, so
/// call sites never need to branch on whether logging is active.
#[derive(Debug, Clone)]
pub struct LoggerSender {
    channel: Option<Sender<String>>,
}

impl LoggerSender {
    pub(super) fn new(channel: Sender<String>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    /// A sender that discards everything written to it.
    pub fn disabled() -> Self {
        Self { channel: None }
    }

    pub fn info(&self, message: &str) {
        self.send("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        self.send("WARN", message);
    }

    pub fn error(&self, message: &str) {
        self.send("ERROR", message);
    }

    fn send(&self, level: &str, message: &str) {
        let Some(channel) = &self.channel else {
            return;
        };
        let _ = channel
            .send(format!("[{level}] {message}"))
            .map_err(|_| LoggerError::SendError(message.to_string()));
    }
}

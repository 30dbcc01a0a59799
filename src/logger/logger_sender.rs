use super::logger_error::LoggerError;
use std::sync::mpsc::Sender;

/// A `LoggerSender` representing the sender channel connected to a `Logger`.
///
/// Cheap to clone: every peer session and the orchestrator hold their own handle onto the
/// same background writer thread.
#[derive(Debug, Clone)]
pub struct LoggerSender {
    sender: Sender<String>,
    verbose: bool,
}

impl LoggerSender {
    /// Creates a new `LoggerSender` from a clone of an existing sender.
    ///
    /// `verbose` gates `.debug()`: when false, debug lines are dropped at the call site
    /// instead of being sent down the channel.
    pub fn new(sender: Sender<String>, verbose: bool) -> Self {
        Self { sender, verbose }
    }

    /// Logs an informational line.
    pub fn info(&self, value: &str) -> Result<(), LoggerError> {
        self.send_leveled("INFO", value)
    }

    /// Logs a warning line.
    pub fn warn(&self, value: &str) -> Result<(), LoggerError> {
        self.send_leveled("WARN", value)
    }

    /// Logs an error line.
    pub fn error(&self, value: &str) -> Result<(), LoggerError> {
        self.send_leveled("ERROR", value)
    }

    /// Logs a debug line. Only written when the client was started with `--verbose`.
    pub fn debug(&self, value: &str) -> Result<(), LoggerError> {
        if !self.verbose {
            return Ok(());
        }
        self.send_leveled("DEBUG", value)
    }

    fn send_leveled(&self, level: &str, value: &str) -> Result<(), LoggerError> {
        let line = format!("[{}] {}", level, value);
        self.sender
            .send(line.clone())
            .map_err(|_| LoggerError::SendError(line))
    }
}

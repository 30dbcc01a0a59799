use std::fmt;

/// Logger possible errors.
#[derive(Debug)]
pub enum LoggerError {
    SpawnThreadError,
    SendError(String),
    BadLogPathError(String),
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerError::SpawnThreadError => write!(f, "could not spawn logger thread"),
            LoggerError::SendError(msg) => write!(f, "could not send log line: {}", msg),
            LoggerError::BadLogPathError(path) => write!(f, "could not open log file at {}", path),
        }
    }
}

impl std::error::Error for LoggerError {}

use std::fmt::Debug;

/// Wraps a human-readable message so it prints cleanly through `Debug`,
/// matching the way the rest of this crate's error enums format via `{:?}`.
#[derive(PartialEq)]
pub struct ErrorMessage {
    pub message: String,
}

impl Debug for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.message)
    }
}

impl ErrorMessage {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

//! Error types for the editor

use thiserror::Error;

/// Failure reported by a save collaborator
///
/// Whatever the collaborator fails with (an error, a plain string, a panic)
/// ends up here carrying a message, so consumers see one shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SaveError {
    message: String,
}

impl SaveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Wrap any displayable error
    pub fn from_display(error: impl std::fmt::Display) -> Self {
        Self::new(error.to_string())
    }

    /// Normalise a panic payload caught from a save future
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        if let Some(s) = payload.downcast_ref::<&str>() {
            Self::new(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Self::new(s.clone())
        } else {
            Self::new("Save panicked")
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for SaveError {
    fn from(s: String) -> Self {
        SaveError::new(s)
    }
}

impl From<&str> for SaveError {
    fn from(s: &str) -> Self {
        SaveError::new(s)
    }
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::from_display(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_rejection_becomes_error() {
        let error: SaveError = "x".into();
        assert_eq!(error.message(), "x");
        assert_eq!(error.to_string(), "x");
    }

    #[test]
    fn test_panic_payloads() {
        assert_eq!(SaveError::from_panic(Box::new("boom")).message(), "boom");
        assert_eq!(SaveError::from_panic(Box::new(String::from("bang"))).message(), "bang");
        assert_eq!(SaveError::from_panic(Box::new(7_u32)).message(), "Save panicked");
    }
}

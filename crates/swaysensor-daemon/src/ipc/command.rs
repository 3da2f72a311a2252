//! Bounded compositor commands

use std::fmt;

use super::codec::check_payload_size;
use super::IpcError;
use crate::backend::Backend;

/// A command string that is known to fit the backend's payload limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
}

impl Command {
    /// Validate `text` against the payload limit of `backend`
    ///
    /// # Errors
    ///
    /// Returns `IpcError::PayloadTooLarge` if the command does not fit.
    /// Nothing is truncated.
    pub fn new(backend: Backend, text: impl Into<String>) -> Result<Self, IpcError> {
        let text = text.into();
        check_payload_size(backend, text.len())?;
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

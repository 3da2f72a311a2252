//! Error types for compositor IPC operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to the compositor
#[derive(Debug, Error)]
pub enum IpcError {
    /// Failed to connect to the compositor socket
    #[error("Failed to connect to compositor socket at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a request failed
    #[error("Failed to send request to compositor: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a response failed
    #[error("Failed to receive response from compositor: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The compositor closed the connection before a full response arrived
    #[error("Connection to compositor closed after {received} of {expected} bytes")]
    ConnectionClosed { received: usize, expected: usize },

    /// The request does not fit in the backend's payload limit
    #[error("Payload of {size} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// The response does not have the expected shape
    #[error("Malformed response from compositor: {reason}")]
    MalformedResponse { reason: String },

    /// The compositor answered but did not report success
    #[error("Compositor rejected command `{command}`: {response}")]
    Rejected { command: String, response: String },
}

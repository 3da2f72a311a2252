//! Display identity resolution
//!
//! Orientation and proximity commands name the output they act on. The
//! first output the compositor lists is taken as the primary display and
//! resolved once, before any sensor event is handled.

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{Backend, ReplyFormat};
use crate::ipc::{find, Connector, IpcClient, IpcError};

/// Errors raised while resolving the display identity
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The list-outputs request itself failed
    #[error("Failed to list outputs: {0}")]
    Ipc(#[from] IpcError),

    /// The listing did not contain a usable output name
    #[error("No output found in {backend} output listing")]
    NoOutputFound { backend: Backend },
}

/// Name of the primary output, used as the target of display commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    name: String,
}

impl DeviceIdentity {
    /// Returns `None` for an empty name
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.is_empty() {
            None
        } else {
            Some(Self { name })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Pull the first output name out of a listing
///
/// JSON listings yield `[0]["name"]`. Text listings yield whatever follows
/// the backend's name marker, up to the terminator or the end of the buffer.
pub fn extract_output_name(backend: Backend, listing: &[u8]) -> Option<DeviceIdentity> {
    match backend.vocabulary().replies {
        ReplyFormat::Json => first_json_output(listing),
        ReplyFormat::Text {
            name_marker,
            name_terminator,
            ..
        } => first_text_output(listing, name_marker, name_terminator),
    }
}

fn first_json_output(listing: &[u8]) -> Option<DeviceIdentity> {
    let outputs: Value = match serde_json::from_slice(listing) {
        Ok(outputs) => outputs,
        Err(e) => {
            warn!(error = %e, "Output listing is not valid JSON");
            return None;
        }
    };

    let name = outputs.get(0)?.get("name")?.as_str()?;
    DeviceIdentity::new(name)
}

fn first_text_output(listing: &[u8], marker: &str, terminator: char) -> Option<DeviceIdentity> {
    let start = find(listing, marker.as_bytes())? + marker.len();
    let rest = &listing[start..];

    let mut buf = [0u8; 4];
    let terminator = terminator.encode_utf8(&mut buf).as_bytes();
    let end = find(rest, terminator).unwrap_or(rest.len());

    let name = std::str::from_utf8(&rest[..end]).ok()?;
    DeviceIdentity::new(name)
}

/// Ask the compositor for its outputs and resolve the primary display
///
/// # Errors
///
/// Returns `ResolveError::Ipc` if the request fails and
/// `ResolveError::NoOutputFound` if the listing has no usable name.
pub async fn resolve_device_identity<C: Connector>(
    client: &IpcClient<C>,
) -> Result<DeviceIdentity, ResolveError> {
    let backend = client.backend();
    let listing = client.get_outputs().await?;

    let identity =
        extract_output_name(backend, &listing).ok_or(ResolveError::NoOutputFound { backend })?;

    info!(backend = %backend, display = %identity, "Resolved primary display");

    Ok(identity)
}

//! Request encoding and response decoding
//!
//! Sway-like backends use i3 IPC framing:
//!
//! ```text
//! offset 0   : 6 bytes   "i3-ipc"
//! offset 6   : 4 bytes   payload length (native byte order)
//! offset 10  : 4 bytes   message type
//! offset 14  : N bytes   payload
//! ```
//!
//! Hyprland-like backends take the raw command text and answer with plain
//! text, closing the connection afterwards.

use serde_json::Value;
use tokio::io::AsyncRead;
use tracing::debug;

use super::transport::Receiver;
use super::IpcError;
use crate::backend::{Backend, ReplyFormat};

/// i3 IPC magic string
pub const MAGIC: &[u8; 6] = b"i3-ipc";

/// i3 IPC header size: magic + length + type
pub const HEADER_LEN: usize = 14;

const LENGTH_OFFSET: usize = 6;
const TYPE_OFFSET: usize = 10;

/// Reject framed responses larger than this to guard against bogus length fields
pub const MAX_RESPONSE_PAYLOAD: usize = 1024 * 1024;

/// Read buffer for plain-text responses
pub const PLAIN_RESPONSE_BUFFER: usize = 1024;

/// Requests the daemon issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    RunCommand = 0,
    GetOutputs = 3,
}

impl MessageType {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Wire encoding used by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Fixed binary header followed by the payload
    Framed,
    /// Raw text, no header
    PlainText,
}

impl Framing {
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Sway => Self::Framed,
            Backend::Hyprland => Self::PlainText,
        }
    }
}

/// Decoded i3 IPC header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_len: u32,
    pub message_type: u32,
}

/// Build one i3 IPC frame
pub fn encode_frame(message_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    frame.extend_from_slice(&message_type.to_ne_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Parse the fixed-size header at the start of `bytes`
pub fn decode_header(bytes: &[u8]) -> Result<Header, IpcError> {
    if bytes.len() < HEADER_LEN {
        return Err(IpcError::MalformedResponse {
            reason: format!("header is {} bytes, expected {}", bytes.len(), HEADER_LEN),
        });
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(IpcError::MalformedResponse {
            reason: "invalid i3-ipc magic".to_string(),
        });
    }

    let field = |offset: usize| {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[offset..offset + 4]);
        u32::from_ne_bytes(raw)
    };

    Ok(Header {
        payload_len: field(LENGTH_OFFSET),
        message_type: field(TYPE_OFFSET),
    })
}

/// Position of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Fail unless a payload of `size` bytes fits the backend's limit
pub fn check_payload_size(backend: Backend, size: usize) -> Result<(), IpcError> {
    let max = backend.max_payload();
    if size > max {
        return Err(IpcError::PayloadTooLarge { size, max });
    }
    Ok(())
}

/// Encoder and decoder for one backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    backend: Backend,
    framing: Framing,
}

impl Codec {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            framing: Framing::for_backend(backend),
        }
    }

    /// Encode a request
    ///
    /// # Errors
    ///
    /// Returns `IpcError::PayloadTooLarge` before anything is written if the
    /// payload exceeds the backend's limit.
    pub fn encode(&self, kind: MessageType, payload: &str) -> Result<Vec<u8>, IpcError> {
        check_payload_size(self.backend, payload.len())?;

        Ok(match self.framing {
            Framing::Framed => encode_frame(kind.code(), payload.as_bytes()),
            Framing::PlainText => payload.as_bytes().to_vec(),
        })
    }

    /// Read one response and return its payload
    pub async fn read_response<S: AsyncRead>(
        &self,
        receiver: &mut Receiver<'_, S>,
    ) -> Result<Vec<u8>, IpcError> {
        match self.framing {
            Framing::Framed => {
                let header = decode_header(&receiver.recv_exact(HEADER_LEN).await?)?;
                let len = header.payload_len as usize;
                if len > MAX_RESPONSE_PAYLOAD {
                    return Err(IpcError::MalformedResponse {
                        reason: format!("response payload too large: {} bytes", len),
                    });
                }
                receiver.recv_exact(len).await
            }
            Framing::PlainText => receiver.recv_up_to(PLAIN_RESPONSE_BUFFER).await,
        }
    }

    /// Whether a command response reports success
    ///
    /// JSON replies succeed when any result object has `"success": true`;
    /// text replies when they start with the acknowledgement token.
    pub fn is_success(&self, payload: &[u8]) -> bool {
        match self.backend.vocabulary().replies {
            ReplyFormat::Json => json_success(payload),
            ReplyFormat::Text { ack, .. } => String::from_utf8_lossy(payload)
                .trim_start()
                .starts_with(ack),
        }
    }
}

fn json_success(payload: &[u8]) -> bool {
    let succeeded = |result: &Value| result.get("success").and_then(Value::as_bool) == Some(true);

    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Array(results)) => results.iter().any(succeeded),
        Ok(result) => succeeded(&result),
        Err(e) => {
            debug!(error = %e, "Command reply is not valid JSON");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HYPRLAND_MAX_PAYLOAD, SWAY_MAX_PAYLOAD};
    use crate::ipc::Connection;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_frame_header_carries_payload_length() {
        let payload = "output eDP-1 transform 90";
        let frame = Codec::new(Backend::Sway)
            .encode(MessageType::RunCommand, payload)
            .unwrap();

        assert_eq!(frame.len(), HEADER_LEN + payload.len());
        assert_eq!(&frame[..6], b"i3-ipc");

        let header = decode_header(&frame).unwrap();
        assert_eq!(header.payload_len as usize, payload.len());
        assert_eq!(header.message_type, 0);
        assert_eq!(&frame[HEADER_LEN..], payload.as_bytes());
    }

    #[test]
    fn test_get_outputs_frame_is_header_only() {
        let frame = Codec::new(Backend::Sway)
            .encode(MessageType::GetOutputs, "")
            .unwrap();
        let header = decode_header(&frame).unwrap();
        assert_eq!(frame.len(), HEADER_LEN);
        assert_eq!(header.payload_len, 0);
        assert_eq!(header.message_type, 3);
    }

    #[test]
    fn test_plain_text_has_no_header() {
        let bytes = Codec::new(Backend::Hyprland)
            .encode(MessageType::RunCommand, "dispatch dpms off eDP-1")
            .unwrap();
        assert_eq!(bytes, b"dispatch dpms off eDP-1");
    }

    #[test]
    fn test_payload_at_limit_is_accepted() {
        let sway = "x".repeat(SWAY_MAX_PAYLOAD);
        assert!(Codec::new(Backend::Sway)
            .encode(MessageType::RunCommand, &sway)
            .is_ok());

        let hypr = "x".repeat(HYPRLAND_MAX_PAYLOAD);
        assert!(Codec::new(Backend::Hyprland)
            .encode(MessageType::RunCommand, &hypr)
            .is_ok());
    }

    #[test]
    fn test_payload_over_limit_is_rejected() {
        let payload = "x".repeat(SWAY_MAX_PAYLOAD + 1);
        let err = Codec::new(Backend::Sway)
            .encode(MessageType::RunCommand, &payload)
            .unwrap_err();
        match err {
            IpcError::PayloadTooLarge { size, max } => {
                assert_eq!(size, SWAY_MAX_PAYLOAD + 1);
                assert_eq!(max, SWAY_MAX_PAYLOAD);
            }
            other => panic!("Expected PayloadTooLarge, got: {:?}", other),
        }
    }

    #[test]
    fn test_bad_magic_is_malformed() {
        let mut frame = encode_frame(0, b"[]");
        frame[0] = b'x';
        assert!(matches!(
            decode_header(&frame),
            Err(IpcError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_short_header_is_malformed() {
        assert!(matches!(
            decode_header(b"i3-ipc"),
            Err(IpcError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_success_detection() {
        let sway = Codec::new(Backend::Sway);
        assert!(sway.is_success(br#"[ { "success": true } ]"#));
        assert!(!sway.is_success(br#"[ { "success": false, "error": "Unknown output" } ]"#));
        assert!(!sway.is_success(b"[]"));
        assert!(!sway.is_success(b"not json"));

        let hypr = Codec::new(Backend::Hyprland);
        assert!(hypr.is_success(b"ok"));
        assert!(!hypr.is_success(b"Invalid dispatcher"));
    }

    #[test]
    fn test_compact_json_success() {
        let sway = Codec::new(Backend::Sway);
        assert!(sway.is_success(br#"[{"success":true}]"#));
        assert!(sway.is_success(br#"[{"success":false},{"success":true}]"#));
        assert!(sway.is_success(br#"{"success":true}"#));
        assert!(!sway.is_success(br#"[{"success":false,"parse_error":true}]"#));
        assert!(!sway.is_success(br#"[{"success":"true"}]"#));
    }

    #[tokio::test]
    async fn test_read_framed_response() {
        let (client, mut server) = tokio::io::duplex(256);
        let connection = Connection::new(client);
        let body = br#"[ { "success": true } ]"#;

        server.write_all(&encode_frame(0, body)).await.unwrap();

        let codec = Codec::new(Backend::Sway);
        let mut receiver = connection.receiver().await;
        let payload = codec.read_response(&mut receiver).await.unwrap();
        assert_eq!(payload, body);
    }

    #[tokio::test]
    async fn test_read_framed_response_rejects_huge_length() {
        let (client, mut server) = tokio::io::duplex(256);
        let connection = Connection::new(client);

        let mut header = encode_frame(0, b"");
        header[6..10].copy_from_slice(&((MAX_RESPONSE_PAYLOAD + 1) as u32).to_ne_bytes());
        server.write_all(&header).await.unwrap();

        let codec = Codec::new(Backend::Sway);
        let mut receiver = connection.receiver().await;
        let err = codec.read_response(&mut receiver).await.unwrap_err();
        assert!(matches!(err, IpcError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_read_truncated_frame_is_closed() {
        let (client, mut server) = tokio::io::duplex(256);
        let connection = Connection::new(client);

        let frame = encode_frame(0, br#"[ { "success": true } ]"#);
        server.write_all(&frame[..HEADER_LEN + 4]).await.unwrap();
        drop(server);

        let codec = Codec::new(Backend::Sway);
        let mut receiver = connection.receiver().await;
        let err = codec.read_response(&mut receiver).await.unwrap_err();
        assert!(matches!(err, IpcError::ConnectionClosed { received: 4, .. }));
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"abcdef", b"cd"), Some(2));
        assert_eq!(find(b"abc", b"abcd"), None);
        assert_eq!(find(b"abc", b""), Some(0));
    }
}

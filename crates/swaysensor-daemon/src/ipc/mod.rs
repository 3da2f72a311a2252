//! Compositor IPC client
//!
//! This module speaks the compositor control protocols selected in
//! [`crate::backend`]. It provides:
//!
//! - `Transport` / `Connection`: socket ownership with per-direction locks
//! - `Codec`: framing of requests and responses for each backend
//! - `IpcClient`: run-command and list-outputs requests on top of both
//! - `IpcError`: error types for IPC operations

mod client;
mod codec;
mod command;
mod error;
mod transport;

pub use client::IpcClient;
pub use codec::{
    decode_header, encode_frame, Codec, Framing, Header, MessageType, HEADER_LEN, MAGIC,
    MAX_RESPONSE_PAYLOAD, PLAIN_RESPONSE_BUFFER,
};
pub(crate) use codec::find;
pub use command::Command;
pub use error::IpcError;
pub use transport::{Connection, Connector, Receiver, Transport, UnixConnector};

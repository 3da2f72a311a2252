//! Compositor IPC client implementation
//!
//! `IpcClient` ties a [`Codec`] to a [`Transport`] and exposes the two
//! requests the daemon needs: running a command and listing outputs.

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::codec::{Codec, MessageType};
use super::transport::{Connection, Connector, Transport, UnixConnector};
use super::{Command, IpcError};
use crate::backend::{Backend, Selection};

/// Client for the compositor control socket
///
/// # Example
///
/// ```ignore
/// let selection = select_backend()?;
/// let client = IpcClient::connect(&selection).await?;
/// let command = Command::new(selection.backend, "output eDP-1 power off")?;
/// client.run_command(&command).await?;
/// ```
pub struct IpcClient<C: Connector = UnixConnector> {
    backend: Backend,
    codec: Codec,
    transport: Transport<C>,
    in_flight: Mutex<()>,
}

impl IpcClient<UnixConnector> {
    /// Connect to the compositor chosen by backend selection
    ///
    /// # Errors
    ///
    /// Returns `IpcError::ConnectionFailed` if the socket cannot be reached.
    pub async fn connect(selection: &Selection) -> Result<Self, IpcError> {
        Self::with_connector(selection.backend, UnixConnector::new(&selection.socket_path)).await
    }
}

impl<C: Connector> IpcClient<C> {
    /// Connect through an arbitrary connector
    pub async fn with_connector(backend: Backend, connector: C) -> Result<Self, IpcError> {
        let transport = Transport::connect(connector, backend.lifetime()).await?;
        Ok(Self {
            backend,
            codec: Codec::new(backend),
            transport,
            in_flight: Mutex::new(()),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Send one request and return the response payload
    ///
    /// The payload limit is checked before a connection is even requested.
    /// A failed exchange drops the connection so the next request starts
    /// on a clean stream.
    pub async fn request(&self, kind: MessageType, payload: &str) -> Result<Vec<u8>, IpcError> {
        let message = self.codec.encode(kind, payload)?;

        // One request at a time, so each reply pairs with its request
        let _in_flight = self.in_flight.lock().await;

        let connection = self.transport.connection().await?;
        let response = match self.exchange(&connection, &message).await {
            Ok(response) => response,
            Err(e) => {
                self.transport.discard(&connection).await;
                return Err(e);
            }
        };

        debug!(
            backend = %self.backend,
            request = ?kind,
            response_len = response.len(),
            "Compositor replied"
        );

        Ok(response)
    }

    async fn exchange(
        &self,
        connection: &Connection<C::Stream>,
        message: &[u8],
    ) -> Result<Vec<u8>, IpcError> {
        connection.send(message).await?;
        let mut receiver = connection.receiver().await;
        self.codec.read_response(&mut receiver).await
    }

    /// Run a command and check the compositor's verdict
    ///
    /// # Errors
    ///
    /// Returns `IpcError::Rejected` if the response lacks the success marker,
    /// or any transport error.
    pub async fn run_command(&self, command: &Command) -> Result<(), IpcError> {
        let response = self
            .request(MessageType::RunCommand, command.as_str())
            .await?;

        if self.codec.is_success(&response) {
            Ok(())
        } else {
            let response = String::from_utf8_lossy(&response).trim().to_string();
            warn!(backend = %self.backend, %command, %response, "Compositor rejected command");
            Err(IpcError::Rejected {
                command: command.to_string(),
                response,
            })
        }
    }

    /// Ask the compositor for its outputs and return the raw listing
    pub async fn get_outputs(&self) -> Result<Vec<u8>, IpcError> {
        let request = self.backend.vocabulary().list_outputs;
        self.request(MessageType::GetOutputs, request).await
    }

    /// Tear down the connection
    pub async fn close(self) -> Result<(), IpcError> {
        self.transport.close().await
    }
}

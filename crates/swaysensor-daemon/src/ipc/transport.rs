//! Socket transport to the compositor
//!
//! A [`Connection`] wraps one stream split into a read half and a write half,
//! each behind its own lock. Writers never interleave partial frames and
//! readers never interleave partial responses, while a send and a receive
//! may still progress at the same time.
//!
//! [`Transport`] decides how connections are obtained: a persistent backend
//! gets a single connection at startup, a per-request backend gets a fresh
//! connection for every request.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::IpcError;
use crate::backend::Lifetime;

/// Something that can open a stream to the compositor
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a new stream
    fn connect(&self) -> impl Future<Output = Result<Self::Stream, IpcError>> + Send;
}

/// Connects to a Unix domain socket at a fixed path
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Connector for UnixConnector {
    type Stream = UnixStream;

    async fn connect(&self) -> Result<UnixStream, IpcError> {
        UnixStream::connect(&self.path)
            .await
            .map_err(|e| IpcError::ConnectionFailed {
                path: self.path.clone(),
                source: e,
            })
    }
}

/// One live stream with independent send and receive locks
#[derive(Debug)]
pub struct Connection<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Write all of `bytes` while holding the send lock
    ///
    /// Short writes are retried until the buffer is drained.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), IpcError> {
        let mut writer = self.writer.lock().await;
        let mut sent = 0;

        while sent < bytes.len() {
            let n = writer
                .write(&bytes[sent..])
                .await
                .map_err(IpcError::SendFailed)?;
            if n == 0 {
                return Err(IpcError::SendFailed(io::Error::from(io::ErrorKind::WriteZero)));
            }
            sent += n;
        }

        writer.flush().await.map_err(IpcError::SendFailed)
    }

    /// Take the receive lock for a multi-read response
    pub async fn receiver(&self) -> Receiver<'_, S> {
        Receiver {
            reader: self.reader.lock().await,
        }
    }

    /// Read exactly `n` bytes
    pub async fn recv_exact(&self, n: usize) -> Result<Vec<u8>, IpcError> {
        self.receiver().await.recv_exact(n).await
    }

    /// Shut down the write direction
    pub async fn close(&self) -> Result<(), IpcError> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(IpcError::SendFailed)
    }
}

/// Exclusive access to the read half of a [`Connection`]
pub struct Receiver<'a, S> {
    reader: MutexGuard<'a, ReadHalf<S>>,
}

impl<S> Receiver<'_, S>
where
    S: AsyncRead,
{
    /// Read exactly `n` bytes
    ///
    /// # Errors
    ///
    /// Returns `IpcError::ConnectionClosed` if the peer closes the stream
    /// before `n` bytes arrived.
    pub async fn recv_exact(&mut self, n: usize) -> Result<Vec<u8>, IpcError> {
        let mut buf = vec![0u8; n];
        let mut received = 0;

        while received < n {
            let read = self
                .reader
                .read(&mut buf[received..])
                .await
                .map_err(IpcError::ReceiveFailed)?;
            if read == 0 {
                return Err(IpcError::ConnectionClosed {
                    received,
                    expected: n,
                });
            }
            received += read;
        }

        Ok(buf)
    }

    /// Read until `max` bytes are buffered or the peer closes the stream
    ///
    /// # Errors
    ///
    /// Returns `IpcError::ConnectionClosed` if nothing at all was received.
    pub async fn recv_up_to(&mut self, max: usize) -> Result<Vec<u8>, IpcError> {
        let mut buf = vec![0u8; max];
        let mut received = 0;

        while received < max {
            let read = self
                .reader
                .read(&mut buf[received..])
                .await
                .map_err(IpcError::ReceiveFailed)?;
            if read == 0 {
                break;
            }
            received += read;
        }

        if received == 0 {
            return Err(IpcError::ConnectionClosed {
                received: 0,
                expected: max,
            });
        }

        buf.truncate(received);
        Ok(buf)
    }
}

/// Hands out connections according to the backend's [`Lifetime`]
pub struct Transport<C: Connector> {
    connector: C,
    lifetime: Lifetime,
    persistent: Mutex<Option<Arc<Connection<C::Stream>>>>,
}

impl<C: Connector> Transport<C> {
    /// Establish the transport
    ///
    /// A persistent transport opens its connection here. A per-request
    /// transport opens and drops one throwaway connection so an unreachable
    /// compositor is reported at startup.
    pub async fn connect(connector: C, lifetime: Lifetime) -> Result<Self, IpcError> {
        let stream = connector.connect().await?;
        let persistent = match lifetime {
            Lifetime::Persistent => Some(Arc::new(Connection::new(stream))),
            Lifetime::PerRequest => None,
        };

        debug!(?lifetime, "Compositor transport established");

        Ok(Self {
            connector,
            lifetime,
            persistent: Mutex::new(persistent),
        })
    }

    /// Connection to use for the next request
    ///
    /// A persistent transport hands out the same connection until it is
    /// discarded, then reconnects. A per-request transport always opens a
    /// new one.
    pub async fn connection(&self) -> Result<Arc<Connection<C::Stream>>, IpcError> {
        if self.lifetime == Lifetime::PerRequest {
            let stream = self.connector.connect().await?;
            return Ok(Arc::new(Connection::new(stream)));
        }

        let mut slot = self.persistent.lock().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(Arc::clone(connection));
        }

        let stream = self.connector.connect().await?;
        let connection = Arc::new(Connection::new(stream));
        *slot = Some(Arc::clone(&connection));
        info!("Reconnected to compositor");
        Ok(connection)
    }

    /// Stop handing out `connection`
    ///
    /// Used after a failed exchange, when unread bytes may remain on the
    /// stream. The next request on a persistent transport reconnects.
    pub async fn discard(&self, connection: &Arc<Connection<C::Stream>>) {
        let mut slot = self.persistent.lock().await;
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, connection))
        {
            *slot = None;
            warn!("Dropped persistent compositor connection after a failed request");
        }
    }

    /// Shut down the persistent connection, if any
    pub async fn close(self) -> Result<(), IpcError> {
        match self.persistent.into_inner() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }
}

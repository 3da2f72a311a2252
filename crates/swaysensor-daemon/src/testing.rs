//! Test doubles for compositor sockets
//!
//! In-memory streams for exercising the transport, and fake compositors
//! listening on Unix sockets in a temporary directory.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use crate::ipc::{decode_header, encode_frame, Connector, IpcError, UnixConnector, HEADER_LEN};

/// Accepts at most `chunk` bytes per write and yields between writes
#[derive(Debug, Default)]
pub struct ChunkedStream {
    pub written: Arc<std::sync::Mutex<Vec<u8>>>,
    pub write_calls: Arc<AtomicUsize>,
    pub chunk: usize,
    yield_next: bool,
}

impl ChunkedStream {
    pub fn new(chunk: usize) -> Self {
        Self {
            chunk,
            ..Default::default()
        }
    }
}

impl AsyncWrite for ChunkedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.yield_next {
            self.yield_next = false;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.yield_next = true;
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let n = buf.len().min(self.chunk);
        self.written.lock().unwrap().extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncRead for ChunkedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        // Always at end of stream
        Poll::Ready(Ok(()))
    }
}

/// Connector that hands out one prepared stream
pub struct StubConnector<S> {
    stream: std::sync::Mutex<Option<S>>,
}

impl<S> StubConnector<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: std::sync::Mutex::new(Some(stream)),
        }
    }
}

impl<S> Connector for StubConnector<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Stream = S;

    async fn connect(&self) -> Result<S, IpcError> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| IpcError::ConnectionFailed {
                path: PathBuf::from("stub"),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            })
    }
}

/// A fake compositor serving scripted responses
pub struct FakeCompositor<T> {
    path: PathBuf,
    _dir: TempDir,
    handle: JoinHandle<Vec<T>>,
}

impl<T> FakeCompositor<T> {
    pub fn connector(&self) -> UnixConnector {
        UnixConnector::new(&self.path)
    }

    /// Wait for the script to finish and return the requests it saw
    pub async fn requests(self) -> Vec<T> {
        self.handle.await.unwrap()
    }
}

fn bind() -> (TempDir, PathBuf, UnixListener) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compositor.sock");
    let listener = UnixListener::bind(&path).unwrap();
    (dir, path, listener)
}

/// Read one i3-ipc request, or `None` once the client hung up
async fn read_request(stream: &mut UnixStream) -> Option<(u32, String)> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await.ok()?;
    let header = decode_header(&header).unwrap();
    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).await.unwrap();
    Some((header.message_type, String::from_utf8(payload).unwrap()))
}

/// Sway-like compositor: one persistent connection, one frame per response
///
/// Records `(message type, payload)` for every request.
pub fn spawn_sway(responses: Vec<String>) -> FakeCompositor<(u32, String)> {
    let (dir, path, listener) = bind();

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        let (mut stream, _) = listener.accept().await.unwrap();

        for response in responses {
            let Some((message_type, payload)) = read_request(&mut stream).await else {
                break;
            };
            seen.push((message_type, payload));

            let reply = encode_frame(message_type, response.as_bytes());
            stream.write_all(&reply).await.unwrap();
        }

        seen
    });

    FakeCompositor {
        path,
        _dir: dir,
        handle,
    }
}

/// Sway-like compositor answering with raw bytes, one connection per session
///
/// Each session accepts a connection and answers one request per reply in
/// order. The connection is dropped when its session ends.
pub fn spawn_sway_sessions(sessions: Vec<Vec<Vec<u8>>>) -> FakeCompositor<(u32, String)> {
    let (dir, path, listener) = bind();

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();

        for replies in sessions {
            let (mut stream, _) = listener.accept().await.unwrap();
            for reply in replies {
                let Some(request) = read_request(&mut stream).await else {
                    break;
                };
                seen.push(request);
                stream.write_all(&reply).await.unwrap();
            }
        }

        seen
    });

    FakeCompositor {
        path,
        _dir: dir,
        handle,
    }
}

/// Hyprland-like compositor: one connection per request, closed after replying
///
/// Connections that close without sending anything are skipped.
pub fn spawn_hyprland(responses: Vec<String>) -> FakeCompositor<String> {
    let (dir, path, listener) = bind();

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();

        for response in responses {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 1024];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    continue;
                }
                seen.push(String::from_utf8_lossy(&buf[..n]).to_string());
                stream.write_all(response.as_bytes()).await.unwrap();
                break;
            }
        }

        seen
    });

    FakeCompositor {
        path,
        _dir: dir,
        handle,
    }
}

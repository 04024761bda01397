//! Common utilities for integration tests
#![allow(dead_code)]

use http_relay::{HeaderInjection, RelayServer, RelayStats, TcpConnector, UpstreamConnector};
use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};
use tokio::time::timeout;

/// Find an available port
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to random port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Start an upstream server that answers one request per connection and closes.
///
/// The handler receives the request head (up to and including the blank line)
/// and returns the raw bytes to send back. Returns the bound address and a
/// counter of accepted connections.
pub async fn start_upstream_server<F>(
    handler: F,
) -> (SocketAddr, Arc<AtomicUsize>, tokio::task::JoinHandle<()>)
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TokioTcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind upstream server");
    let addr = listener.local_addr().expect("Failed to get upstream addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(handler);

    let counter = accepted.clone();
    let handle = tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            counter.fetch_add(1, Ordering::SeqCst);

            let handler = handler.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = vec![0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&buf[..n]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }

                let response = handler(&request);
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, accepted, handle)
}

/// Start a relay in front of `upstream` on a random local port
pub async fn start_relay(upstream: &str) -> (SocketAddr, RelayStats, tokio::task::JoinHandle<()>) {
    let listener = TokioTcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind relay");
    let server = RelayServer::with_connector(
        listener,
        Arc::new(TcpConnector::new(upstream)),
        HeaderInjection::default(),
    );
    let addr = server.local_addr().expect("Failed to get relay addr");
    let stats = server.stats();

    let handle = tokio::spawn(async move {
        server.run().await.ok();
    });

    (addr, stats, handle)
}

/// Send one request, close the write side and collect everything the relay returns
pub async fn send_request(relay: SocketAddr, request: &[u8]) -> Result<Vec<u8>, String> {
    timeout(Duration::from_secs(5), async {
        let mut stream = TcpStream::connect(relay)
            .await
            .map_err(|e| format!("Failed to connect to relay: {}", e))?;

        stream
            .write_all(request)
            .await
            .map_err(|e| format!("Failed to write request: {}", e))?;
        stream
            .shutdown()
            .await
            .map_err(|e| format!("Failed to shutdown write side: {}", e))?;

        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .await
            .map_err(|e| format!("Failed to read response: {}", e))?;
        Ok(response)
    })
    .await
    .map_err(|_| "Timeout waiting for response".to_string())?
}

/// Poll `condition` until it holds or the attempts run out
pub async fn wait_until<F>(mut condition: F, max_attempts: u32) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..max_attempts {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// In-memory stream driven by a script of reads.
///
/// An empty entry in the script is delivered as one end-of-stream (a read of
/// zero bytes); later entries are still returned by following reads. Once the
/// script is exhausted every read reports end-of-stream. Writes are collected.
pub struct ScriptedStream {
    reads: VecDeque<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedStream {
    pub fn new<I>(reads: I) -> (Self, Arc<Mutex<Vec<u8>>>)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let written = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                reads: reads.into_iter().collect(),
                written: written.clone(),
            },
            written,
        )
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let Some(front) = self.reads.front_mut() else {
            return Poll::Ready(Ok(()));
        };

        if front.is_empty() {
            self.reads.pop_front();
            return Poll::Ready(Ok(()));
        }

        let n = front.len().min(buf.remaining());
        buf.put_slice(&front[..n]);
        front.drain(..n);
        if front.is_empty() {
            self.reads.pop_front();
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Connector handing out one scripted upstream stream, counting dials
pub struct ScriptedConnector {
    stream: Mutex<Option<ScriptedStream>>,
    dials: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(stream: ScriptedStream) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
            dials: AtomicUsize::new(0),
        }
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UpstreamConnector for ScriptedConnector {
    type Stream = ScriptedStream;

    async fn connect(&self) -> http_relay::Result<ScriptedStream> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let stream = self.stream.lock().unwrap().take();
        stream.ok_or_else(|| {
            http_relay::RelayError::connection_failed(
                "scripted",
                io::Error::new(io::ErrorKind::NotConnected, "already dialed"),
            )
        })
    }

    fn addr(&self) -> &str {
        "scripted"
    }
}

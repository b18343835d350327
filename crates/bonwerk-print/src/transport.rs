// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection seam between the probing logic and the operating system.
//
// Everything above this layer talks to a `Connector`, so the scanner and the
// dispatcher can be exercised against an in-memory network in tests.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens outbound byte streams.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The stream type handed back on success.  Dropping it closes the socket.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Attempt a single connection.  No retries.
    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::Stream>;
}

#[async_trait]
impl<C> Connector for Arc<C>
where
    C: Connector + ?Sized,
{
    type Stream = C::Stream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::Stream> {
        (**self).connect(addr).await
    }
}

/// The real transport: plain `tokio` TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        // Receipts are tiny; don't let Nagle hold back the last segment.
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// In-memory network used by the unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::io;
    use std::net::SocketAddr;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

    use super::Connector;

    /// How a simulated address reacts to a connection attempt.
    #[derive(Debug, Clone)]
    pub enum Behaviour {
        /// Connection refused.
        Refuse,
        /// No route to host.
        Unreachable,
        /// Never completes; only the caller's timeout ends the attempt.
        Hang,
        /// Accept, read everything, optionally answer the first read.
        Accept { reply: Option<Vec<u8>> },
        /// Accept, then close immediately.
        Reset,
    }

    #[derive(Default)]
    struct Counters {
        open: AtomicUsize,
        peak: AtomicUsize,
        attempts: AtomicUsize,
    }

    /// Releases one open-socket slot when dropped.
    struct OpenGuard(Arc<Counters>);

    impl OpenGuard {
        fn acquire(counters: &Arc<Counters>) -> Self {
            let now = counters.open.fetch_add(1, Ordering::SeqCst) + 1;
            counters.peak.fetch_max(now, Ordering::SeqCst);
            Self(Arc::clone(counters))
        }
    }

    impl Drop for OpenGuard {
        fn drop(&mut self) {
            self.0.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Client half of a simulated connection.
    pub struct FakeStream {
        inner: DuplexStream,
        _guard: OpenGuard,
    }

    impl AsyncRead for FakeStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for FakeStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    /// A scriptable network with per-address behaviour and socket counters.
    ///
    /// Every address not explicitly configured refuses connections.
    #[derive(Clone, Default)]
    pub struct FakeConnector {
        behaviours: Arc<HashMap<SocketAddr, Behaviour>>,
        latency: Duration,
        counters: Arc<Counters>,
        attempted: Arc<Mutex<Vec<SocketAddr>>>,
        received: Arc<Mutex<HashMap<SocketAddr, Vec<u8>>>>,
    }

    impl FakeConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, addr: &str, behaviour: Behaviour) -> Self {
            let addr: SocketAddr = addr.parse().expect("test address");
            Arc::make_mut(&mut self.behaviours).insert(addr, behaviour);
            self
        }

        /// Delay applied to every connection attempt before it resolves.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Highest number of sockets that were open at the same moment.
        pub fn peak_open(&self) -> usize {
            self.counters.peak.load(Ordering::SeqCst)
        }

        pub fn open_now(&self) -> usize {
            self.counters.open.load(Ordering::SeqCst)
        }

        pub fn attempts(&self) -> usize {
            self.counters.attempts.load(Ordering::SeqCst)
        }

        pub fn attempted(&self) -> Vec<SocketAddr> {
            self.attempted.lock().expect("attempt log").clone()
        }

        /// Bytes the simulated peer at `addr` has read so far.
        pub fn received(&self, addr: &str) -> Vec<u8> {
            let addr: SocketAddr = addr.parse().expect("test address");
            self.received
                .lock()
                .expect("receive log")
                .get(&addr)
                .cloned()
                .unwrap_or_default()
        }

        fn spawn_peer(&self, addr: SocketAddr, mut server: DuplexStream, reply: Option<Vec<u8>>) {
            let received = Arc::clone(&self.received);
            tokio::spawn(async move {
                let mut reply = reply;
                let mut buf = [0u8; 1024];
                loop {
                    match server.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            received
                                .lock()
                                .expect("receive log")
                                .entry(addr)
                                .or_default()
                                .extend_from_slice(&buf[..n]);
                            if let Some(bytes) = reply.take() {
                                if server.write_all(&bytes).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            });
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        type Stream = FakeStream;

        async fn connect(&self, addr: SocketAddr) -> io::Result<FakeStream> {
            let guard = OpenGuard::acquire(&self.counters);
            self.counters.attempts.fetch_add(1, Ordering::SeqCst);
            self.attempted.lock().expect("attempt log").push(addr);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let behaviour = self
                .behaviours
                .get(&addr)
                .cloned()
                .unwrap_or(Behaviour::Refuse);
            match behaviour {
                Behaviour::Refuse => Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
                Behaviour::Unreachable => Err(io::Error::new(
                    io::ErrorKind::HostUnreachable,
                    "no route to host",
                )),
                Behaviour::Hang => std::future::pending().await,
                Behaviour::Accept { reply } => {
                    let (client, server) = tokio::io::duplex(64 * 1024);
                    self.spawn_peer(addr, server, reply);
                    Ok(FakeStream {
                        inner: client,
                        _guard: guard,
                    })
                }
                Behaviour::Reset => {
                    let (client, server) = tokio::io::duplex(1024);
                    drop(server);
                    Ok(FakeStream {
                        inner: client,
                        _guard: guard,
                    })
                }
            }
        }
    }
}

//! In-memory gateway for client tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use nova_apns_binary::{
    BoxedStream, Connector, Endpoint, Endpoints, NoBackoff, PushClient, TransportError,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf};

pub const DUPLEX_CAPACITY: usize = 64 * 1024;

pub fn endpoints() -> Endpoints {
    Endpoints {
        push: Endpoint::new("push.test", 2195),
        feedback: Endpoint::new("feedback.test", 2196),
    }
}

pub fn token_hex(byte: u8) -> String {
    hex::encode([byte; 32])
}

pub fn client(connector: Arc<MockConnector>) -> PushClient {
    PushClient::with_connector(endpoints(), connector, Arc::new(NoBackoff))
}

enum Scripted {
    Stream(BoxedStream),
    Refuse,
}

/// Hands out scripted connections per endpoint port. Once the script for an
/// endpoint is exhausted, further connects hang.
#[derive(Default)]
pub struct MockConnector {
    scripts: Mutex<HashMap<u16, VecDeque<Scripted>>>,
    connects: Mutex<HashMap<u16, usize>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_script(&self, endpoint: &Endpoint, scripted: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(endpoint.port)
            .or_default()
            .push_back(scripted);
    }

    /// Queue a healthy connection; returns the gateway side.
    pub fn add_duplex(&self, endpoint: &Endpoint) -> DuplexStream {
        let (client, server) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.push_script(endpoint, Scripted::Stream(Box::new(client)));
        server
    }

    /// Queue a connection whose writes always fail; reads come from the
    /// returned gateway side.
    pub fn add_failing_writes(&self, endpoint: &Endpoint) -> DuplexStream {
        let (client, server) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.push_script(
            endpoint,
            Scripted::Stream(Box::new(FailingWrites { inner: client })),
        );
        server
    }

    pub fn add_refusal(&self, endpoint: &Endpoint) {
        self.push_script(endpoint, Scripted::Refuse);
    }

    pub fn connects(&self, endpoint: &Endpoint) -> usize {
        self.connects
            .lock()
            .unwrap()
            .get(&endpoint.port)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
        *self.connects.lock().unwrap().entry(endpoint.port).or_default() += 1;
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&endpoint.port)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Stream(stream)) => Ok(stream),
            Some(Scripted::Refuse) => Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            }),
            None => std::future::pending().await,
        }
    }
}

/// Stream that accepts no writes, as after a reset by the peer.
pub struct FailingWrites {
    inner: DuplexStream,
}

impl AsyncRead for FailingWrites {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FailingWrites {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "connection reset by peer",
        )))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A notification frame as seen by the gateway.
#[derive(Debug)]
pub struct ReceivedFrame {
    pub command: u8,
    pub identifier: u32,
    pub expiry: u32,
    pub token: [u8; 32],
    pub payload: serde_json::Value,
}

pub async fn read_notification(server: &mut DuplexStream) -> ReceivedFrame {
    tokio::time::timeout(Duration::from_secs(2), async {
        let command = server.read_u8().await?;
        let identifier = server.read_u32().await?;
        let expiry = server.read_u32().await?;
        let token_len = server.read_u16().await?;
        assert_eq!(token_len, 32);
        let mut token = [0u8; 32];
        server.read_exact(&mut token).await?;
        let payload_len = server.read_u16().await?;
        let mut payload = vec![0u8; usize::from(payload_len)];
        server.read_exact(&mut payload).await?;

        Ok::<_, io::Error>(ReceivedFrame {
            command,
            identifier,
            expiry,
            token,
            payload: serde_json::from_slice(&payload).expect("payload is JSON"),
        })
    })
    .await
    .expect("timed out waiting for a notification frame")
    .expect("failed to read notification frame")
}

pub fn feedback_item(timestamp: u32, token: [u8; 32]) -> BytesMut {
    let mut raw = BytesMut::with_capacity(38);
    raw.put_u32(timestamp);
    raw.put_u16(32);
    raw.put_slice(&token);
    raw
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

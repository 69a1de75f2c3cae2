//! Scripted gateway for front-end tests.
#![allow(dead_code)]

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use nova_apns_binary::{
    BoxedStream, Connector, Endpoint, Endpoints, NoBackoff, PushClient, TransportError,
};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, Mutex};

pub fn endpoints() -> Endpoints {
    Endpoints {
        push: Endpoint::new("push.test", 2195),
        feedback: Endpoint::new("feedback.test", 2196),
    }
}

/// Every push connect yields a fresh duplex whose gateway side is handed to
/// the test; feedback connects replay `feedback` and close.
pub struct GatewayConnector {
    gateways: mpsc::UnboundedSender<DuplexStream>,
    feedback: Mutex<Vec<u8>>,
}

impl GatewayConnector {
    pub fn new(feedback: Vec<u8>) -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
        let (gateways, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            gateways,
            feedback: Mutex::new(feedback),
        });
        (connector, rx)
    }
}

#[async_trait::async_trait]
impl Connector for GatewayConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        if endpoint.port == endpoints().feedback.port {
            let feedback = std::mem::take(&mut *self.feedback.lock().await);
            server.write_all(&feedback).await?;
        } else {
            let _ = self.gateways.send(server);
        }
        Ok(Box::new(client))
    }
}

pub fn push_client(
    feedback: Vec<u8>,
) -> (Arc<PushClient>, mpsc::UnboundedReceiver<DuplexStream>) {
    let (connector, gateways) = GatewayConnector::new(feedback);
    let client = PushClient::with_connector(endpoints(), connector, Arc::new(NoBackoff));
    (Arc::new(client), gateways)
}

pub fn feedback_item(timestamp: u32, token: [u8; 32]) -> Vec<u8> {
    let mut raw = BytesMut::with_capacity(38);
    raw.put_u32(timestamp);
    raw.put_u16(32);
    raw.put_slice(&token);
    raw.to_vec()
}

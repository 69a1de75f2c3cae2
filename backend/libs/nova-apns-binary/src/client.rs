use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::codec::{ERROR_RESPONSE_LEN, MAX_PAYLOAD_SIZE};
use crate::config::{ApnsConfig, Endpoints};
use crate::error_frame::ErrorFrame;
use crate::errors::{ApnsError, ValidationError};
use crate::feedback::{run_feedback_service, FeedbackItem};
use crate::notification::{Notification, DEFAULT_SOUND};
use crate::reconnect::ReconnectPolicy;
use crate::transport::{read_frame, BoxedStream, Connector, TlsGatewayConnector};

/// Upper bound for the TLS close handshake when tearing a connection down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Transport failed; waiting for the error reader to exit before
    /// reconnecting.
    Draining,
}

/// Persistent client for the APNs binary gateway.
///
/// Callers enqueue notifications and return immediately; a background send
/// loop owns the connection, writes frames in order and reconnects on
/// failure. A second task per connection reads the gateway's asynchronous
/// error response. Feedback is drained over its own connection, started on
/// the first `poll_feedback` call.
pub struct PushClient {
    inner: Arc<Inner>,
    tasks: Mutex<Tasks>,
}

struct Inner {
    endpoints: Endpoints,
    connector: Arc<dyn Connector>,
    reconnect: Arc<dyn ReconnectPolicy>,
    outbound_tx: mpsc::UnboundedSender<Notification>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Notification>>,
    /// Notification taken off the queue but not yet fully written. Sent
    /// before anything else on the next connection, including after a
    /// `stop`/`start` cycle.
    in_flight: Mutex<Option<Notification>>,
    state: watch::Sender<ConnectionState>,
    last_error: Mutex<Option<ErrorFrame>>,
    feedback_tx: mpsc::UnboundedSender<FeedbackItem>,
    feedback_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FeedbackItem>>,
}

#[derive(Default)]
struct Tasks {
    push: Option<JoinHandle<()>>,
    feedback: Option<JoinHandle<()>>,
}

/// Aborts the per-connection error reader when the send loop drops it,
/// including when the send loop itself is cancelled.
struct ErrorReader {
    handle: JoinHandle<()>,
    finished: bool,
}

impl Drop for ErrorReader {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

enum Disconnect {
    /// The error reader ended: remote close, read error or error response.
    Remote,
    WriteFailed,
}

impl PushClient {
    /// Build a client talking TLS to the gateway selected by `cfg`.
    pub fn new(cfg: &ApnsConfig) -> Result<Self, ApnsError> {
        let connector = TlsGatewayConnector::from_config(cfg)?;
        Ok(Self::with_connector(
            cfg.endpoints(),
            Arc::new(connector),
            Arc::new(cfg.reconnect_policy()),
        ))
    }

    pub fn with_connector(
        endpoints: Endpoints,
        connector: Arc<dyn Connector>,
        reconnect: Arc<dyn ReconnectPolicy>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                endpoints,
                connector,
                reconnect,
                outbound_tx,
                outbound_rx: tokio::sync::Mutex::new(outbound_rx),
                in_flight: Mutex::new(None),
                state,
                last_error: Mutex::new(None),
                feedback_tx,
                feedback_rx: tokio::sync::Mutex::new(feedback_rx),
            }),
            tasks: Mutex::new(Tasks::default()),
        }
    }

    /// Launch the send loop. No-op while it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.push.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        tasks.push = Some(tokio::spawn(run_push_service(self.inner.clone())));
    }

    /// Queue a notification for delivery. Never blocks; the queue is
    /// unbounded.
    pub fn enqueue(&self, notification: Notification) {
        if notification.payload().len() > MAX_PAYLOAD_SIZE {
            warn!(
                identifier = notification.identifier(),
                size = notification.payload().len(),
                "Payload exceeds the gateway limit of {} bytes",
                MAX_PAYLOAD_SIZE
            );
        }
        if self.inner.outbound_tx.send(notification).is_err() {
            error!("Outbound queue closed, notification dropped");
        }
    }

    /// Build and queue a plain alert with the default sound.
    pub fn send(&self, device_token: &str, message: &str) -> Result<(), ValidationError> {
        self.send_with_sound(device_token, message, DEFAULT_SOUND)
    }

    pub fn send_with_sound(
        &self,
        device_token: &str,
        message: &str,
        sound: &str,
    ) -> Result<(), ValidationError> {
        let notification = Notification::builder(device_token, message)
            .sound(sound)
            .build()?;
        self.enqueue(notification);
        Ok(())
    }

    /// Whether the push connection is currently established.
    pub fn status(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Wait until connected or `timeout` elapses; returns the final status.
    pub async fn await_ready(&self, timeout: Duration) -> bool {
        let mut state = self.inner.state.subscribe();
        let _ = tokio::time::timeout(
            timeout,
            state.wait_for(|s| *s == ConnectionState::Connected),
        )
        .await;
        self.status()
    }

    /// Most recent error response from the gateway.
    ///
    /// This is a single slot overwritten by every new error response; when
    /// several arrive between two calls only the latest is visible.
    pub fn last_error(&self) -> Option<ErrorFrame> {
        *self.inner.last_error.lock()
    }

    /// Next stale device token from the feedback service, or `None` after
    /// `timeout`. The first call opens the feedback connection.
    pub async fn poll_feedback(&self, timeout: Duration) -> Option<FeedbackItem> {
        self.start_feedback();
        tokio::time::timeout(timeout, async {
            let mut items = self.inner.feedback_rx.lock().await;
            items.recv().await
        })
        .await
        .ok()
        .flatten()
    }

    fn start_feedback(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.feedback.is_none() {
            tasks.feedback = Some(tokio::spawn(run_feedback_service(
                self.inner.connector.clone(),
                self.inner.endpoints.feedback.clone(),
                self.inner.feedback_tx.clone(),
            )));
        }
    }

    /// Cancel the send, error-reader and feedback tasks.
    ///
    /// Connections are closed as the cancelled tasks drop them. Notifications
    /// still queued, including one whose write had failed, stay queued for a
    /// later `start`.
    pub async fn stop(&self) {
        let (push, feedback) = {
            let mut tasks = self.tasks.lock();
            (tasks.push.take(), tasks.feedback.take())
        };

        for handle in [push, feedback].into_iter().flatten() {
            handle.abort();
            let _ = handle.await;
        }

        self.inner.state.send_replace(ConnectionState::Disconnected);
        info!("Push client stopped");
    }
}

impl Drop for PushClient {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut();
        for handle in [tasks.push.take(), tasks.feedback.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// Send loop: connect, drain the outbound queue onto the connection, and
/// reconnect whenever the connection goes down. Runs until cancelled.
async fn run_push_service(inner: Arc<Inner>) {
    let mut outbound = inner.outbound_rx.lock().await;
    let mut attempt: u32 = 0;

    loop {
        inner.set_state(ConnectionState::Connecting);
        info!(endpoint = %inner.endpoints.push, "Push service connecting");

        let stream = match inner.connector.connect(&inner.endpoints.push).await {
            Ok(stream) => stream,
            Err(e) => {
                inner.set_state(ConnectionState::Disconnected);
                warn!(endpoint = %inner.endpoints.push, attempt, error = %e, "Push connection failed");
                wait_before_reconnect(inner.reconnect.as_ref(), &mut attempt).await;
                continue;
            }
        };
        attempt = 0;

        // Connected must land before the error reader can report the
        // connection down.
        inner.set_state(ConnectionState::Connected);
        info!(endpoint = %inner.endpoints.push, "Push service connected");
        let (reader, mut writer) = tokio::io::split(stream);
        let mut error_reader = ErrorReader {
            handle: tokio::spawn(read_error_response(inner.clone(), reader)),
            finished: false,
        };

        let reason = loop {
            let pending = inner.in_flight.lock().clone();
            let notification = match pending {
                Some(notification) => notification,
                None => tokio::select! {
                    biased;
                    _ = &mut error_reader.handle => {
                        error_reader.finished = true;
                        break Disconnect::Remote;
                    }
                    next = outbound.recv() => match next {
                        Some(notification) => {
                            *inner.in_flight.lock() = Some(notification.clone());
                            notification
                        }
                        // The sender lives in `inner`, so this only happens on teardown.
                        None => return,
                    },
                },
            };

            if let Err(e) = write_notification(&mut writer, &notification).await {
                error!(
                    identifier = notification.identifier(),
                    error = %e,
                    "Failed to write notification, will retry after reconnect"
                );
                break Disconnect::WriteFailed;
            }
            inner.in_flight.lock().take();
            debug!(
                identifier = notification.identifier(),
                token = %notification.token_hex(),
                "Notification written"
            );
        };

        if let Disconnect::WriteFailed = reason {
            inner.set_state(ConnectionState::Draining);
        }
        close_connection(writer, error_reader).await;
        inner.set_state(ConnectionState::Disconnected);
        info!(endpoint = %inner.endpoints.push, "Push connection closed");

        wait_before_reconnect(inner.reconnect.as_ref(), &mut attempt).await;
    }
}

async fn write_notification(
    writer: &mut WriteHalf<BoxedStream>,
    notification: &Notification,
) -> std::io::Result<()> {
    writer.write_all(&notification.frame()).await?;
    writer.flush().await
}

async fn close_connection(mut writer: WriteHalf<BoxedStream>, mut error_reader: ErrorReader) {
    if !error_reader.finished {
        error_reader.handle.abort();
        let _ = (&mut error_reader.handle).await;
    }
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, writer.shutdown()).await;
}

async fn wait_before_reconnect(policy: &dyn ReconnectPolicy, attempt: &mut u32) {
    let delay = policy.delay(*attempt);
    *attempt = attempt.saturating_add(1);
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
        tokio::time::sleep(delay).await;
    }
}

/// Error reader: wait for the single error response the gateway sends before
/// closing. Whatever ends the read, this connection is finished.
async fn read_error_response(inner: Arc<Inner>, mut reader: ReadHalf<BoxedStream>) {
    debug!("Error reader starting");
    let mut buf = [0u8; ERROR_RESPONSE_LEN];

    match read_frame(&mut reader, &mut buf).await {
        Ok(0) => info!("Gateway closed the push connection"),
        Ok(n) => {
            let frame = ErrorFrame::decode(&buf[..n]);
            warn!(
                status = %frame.status,
                code = ?frame.status.code(),
                identifier = frame.identifier,
                "Gateway error response"
            );
            *inner.last_error.lock() = Some(frame);
        }
        Err(e) => warn!(error = %e, "Push connection read failed"),
    }

    inner.set_state(ConnectionState::Disconnected);
}

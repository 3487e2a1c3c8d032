//! WebSocket connection manager
//!
//! Owns the single duplex connection to the backend. Outbound messages are
//! queued to a writer half; inbound text frames are parsed and forwarded to
//! the driver as [`ConnectionEvent`]s. Frames that fail to parse are logged
//! and dropped without closing the connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use rx_core::error::TransportError;
use rx_core::traits::MessageSink;
use rx_protocol::{Inbound, Outbound};

/// Channel capacity for events delivered to the driver.
///
/// The backend sends at most one reply per request plus the identity
/// message, so the buffer only absorbs bursts while the driver is busy
/// awaiting an upload.
const CONNECTION_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for outbound frames awaiting the writer
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Events produced by the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A parsed inbound message
    Message(Inbound),
    /// The connection is gone. Always the last event.
    Closed { reason: String },
}

/// Handle to an open WebSocket connection
pub struct ConnectionManager {
    url: String,
    outbound_tx: mpsc::Sender<Outbound>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Open a connection to `url`.
    ///
    /// Returns the manager and the receiver for its events. The attempt is
    /// bounded by `connect_timeout`.
    pub async fn open(
        url: &str,
        connect_timeout: Duration,
    ) -> Result<(Self, mpsc::Receiver<ConnectionEvent>), TransportError> {
        tracing::debug!("Connecting to {}", url);

        let (stream, _response) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                url: url.to_string(),
                timeout: connect_timeout,
            })?
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!("Connected to {}", url);

        let (event_tx, event_rx) = mpsc::channel(CONNECTION_EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        tokio::spawn(run_connection(
            stream,
            outbound_rx,
            event_tx,
            Arc::clone(&open),
            cancel.clone(),
        ));

        Ok((
            Self {
                url: url.to_string(),
                outbound_tx,
                open,
                cancel,
            },
            event_rx,
        ))
    }

    /// URL this connection was opened against
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl MessageSink for ConnectionManager {
    async fn send(&self, message: Outbound) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        tracing::debug!("Closing connection to {}", self.url);
        self.cancel.cancel();
        Ok(())
    }
}

/// Pump frames in both directions until either side closes.
///
/// Emits exactly one `Closed` event on exit.
async fn run_connection(
    stream: WsStream,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = stream.split();

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break "closed by client".to_string();
            }

            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break "client dropped".to_string();
                };
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to encode {} message: {}", message.kind(), e);
                        continue;
                    }
                };
                tracing::debug!(kind = message.kind(), "Sending message");
                if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                    break format!("send failed: {}", e);
                }
            }

            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match Inbound::from_json(&text) {
                            Ok(message) => {
                                tracing::debug!(kind = message.kind(), "Received message");
                                if event_tx.send(ConnectionEvent::Message(message)).await.is_err() {
                                    break "event receiver dropped".to_string();
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Dropping malformed frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) if !frame.reason.is_empty() => {
                                format!("closed by server: {}", frame.reason)
                            }
                            _ => "closed by server".to_string(),
                        };
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!("Ignoring binary frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("receive failed: {}", e),
                    None => break "connection ended".to_string(),
                }
            }
        }
    };

    open.store(false, Ordering::SeqCst);
    tracing::info!("Connection closed: {}", reason);
    let _ = event_tx.send(ConnectionEvent::Closed { reason }).await;
}

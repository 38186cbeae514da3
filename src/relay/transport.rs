//! Relay transport
//!
//! Owns the WebSocket connection to the relay server. The transport is the
//! reconnection boundary: it dials with a bounded timeout, pumps JSON text
//! frames both ways, and on loss backs off exponentially and redials,
//! emitting `Connected` after every successful dial so the connector can
//! re-register. The connector sees the transport only as a channel pair.

use crate::error::RelayError;
use crate::relay::protocol::RelayMessage;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Buffer for outbound relay messages (frames dominate; keep it shallow)
const OUTBOUND_BUFFER: usize = 16;

/// Buffer for inbound transport events
const EVENT_BUFFER: usize = 64;

/// Transport-level events delivered to the connector
#[derive(Debug)]
pub enum TransportEvent {
    /// The transport (re)connected; the connector must (re)register
    Connected,
    /// The transport lost its connection; reconnection is in progress
    Disconnected {
        /// Human-readable loss reason
        reason: String,
    },
    /// A relay message arrived
    Message(RelayMessage),
}

/// The connector's view of the transport: outbound messages in one
/// direction, transport events in the other
pub struct RelayLink {
    /// Sender for agent → relay messages
    pub outbound: mpsc::Sender<RelayMessage>,
    /// Receiver for transport events
    pub events: mpsc::Receiver<TransportEvent>,
}

/// The far end of a loopback link, acting as the relay in tests
pub struct LoopbackRelay {
    /// Injects transport events toward the connector
    pub events: mpsc::Sender<TransportEvent>,
    /// Receives the agent's outbound messages
    pub outbound: mpsc::Receiver<RelayMessage>,
}

/// Creates a loopback link pair for tests and local wiring
pub fn loopback_link(buffer: usize) -> (RelayLink, LoopbackRelay) {
    let (out_tx, out_rx) = mpsc::channel(buffer);
    let (event_tx, event_rx) = mpsc::channel(buffer);

    (
        RelayLink {
            outbound: out_tx,
            events: event_rx,
        },
        LoopbackRelay {
            events: event_tx,
            outbound: out_rx,
        },
    )
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Relay WebSocket URL
    pub url: String,
    /// Dial timeout
    pub connect_timeout: Duration,
    /// Initial reconnect backoff
    pub reconnect_base: Duration,
    /// Maximum reconnect backoff
    pub reconnect_max: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

/// Connects to the relay, returning the link immediately
///
/// The supervisor task keeps dialing (and redialing) in the background for
/// the lifetime of the link.
pub fn connect(config: TransportConfig) -> RelayLink {
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(run_supervisor(config, out_rx, event_tx));

    RelayLink {
        outbound: out_tx,
        events: event_rx,
    }
}

enum PumpExit {
    /// The link's outbound sender or event receiver was dropped
    LinkDropped,
    /// The WebSocket connection died
    ConnectionLost(String),
}

/// Dial-pump-backoff loop; runs until the link is dropped
async fn run_supervisor(
    config: TransportConfig,
    mut out_rx: mpsc::Receiver<RelayMessage>,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    let mut backoff = config.reconnect_base;

    loop {
        info!("Connecting to relay at {}", config.url);
        let ws = match timeout(config.connect_timeout, connect_async(&config.url)).await {
            Ok(Ok((ws, _response))) => Some(ws),
            Ok(Err(e)) => {
                warn!("{}", RelayError::ConnectionFailed(e.to_string()));
                None
            }
            Err(_) => {
                warn!("{}", RelayError::ConnectTimeout(config.connect_timeout));
                None
            }
        };

        let Some(ws) = ws else {
            if !drain_outbound_during(&mut out_rx, backoff).await {
                return;
            }
            backoff = (backoff * 2).min(config.reconnect_max);
            continue;
        };

        info!("Relay connection established");
        backoff = config.reconnect_base;
        if event_tx.send(TransportEvent::Connected).await.is_err() {
            return;
        }

        match pump(ws, &mut out_rx, &event_tx).await {
            PumpExit::LinkDropped => return,
            PumpExit::ConnectionLost(reason) => {
                warn!("Relay connection lost: {}", reason);
                if event_tx
                    .send(TransportEvent::Disconnected { reason })
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }

        if !drain_outbound_during(&mut out_rx, backoff).await {
            return;
        }
        backoff = (backoff * 2).min(config.reconnect_max);
    }
}

/// Bridges the WebSocket and the link channels until either side ends
async fn pump(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    out_rx: &mut mpsc::Receiver<RelayMessage>,
    event_tx: &mpsc::Sender<TransportEvent>,
) -> PumpExit {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            outgoing = out_rx.recv() => match outgoing {
                Some(message) => match message.to_json() {
                    Ok(json) => {
                        if let Err(e) = sink.send(WsMessage::Text(json)).await {
                            return PumpExit::ConnectionLost(e.to_string());
                        }
                    }
                    Err(e) => warn!("Dropping unserializable outbound message: {}", e),
                },
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return PumpExit::LinkDropped;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match RelayMessage::from_json(&text) {
                    Ok(message) => {
                        if event_tx.send(TransportEvent::Message(message)).await.is_err() {
                            return PumpExit::LinkDropped;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed relay message: {}", e),
                },
                // tungstenite answers pings internally
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                Some(Ok(WsMessage::Close(_))) | None => {
                    return PumpExit::ConnectionLost("closed by relay".to_string());
                }
                Some(Ok(other)) => debug!("Ignoring non-text relay frame: {:?}", other),
                Some(Err(e)) => return PumpExit::ConnectionLost(e.to_string()),
            },
        }
    }
}

/// Waits out a backoff period while discarding outbound messages
///
/// Returns false when the link was dropped and the supervisor should exit.
async fn drain_outbound_during(
    out_rx: &mut mpsc::Receiver<RelayMessage>,
    wait: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return true,
            message = out_rx.recv() => match message {
                Some(_) => debug!("Relay disconnected; dropping outbound message"),
                None => return false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_roundtrip() {
        let (mut link, mut relay) = loopback_link(8);

        link.outbound
            .send(RelayMessage::ScreenStop)
            .await
            .unwrap();
        assert!(matches!(
            relay.outbound.recv().await,
            Some(RelayMessage::ScreenStop)
        ));

        relay
            .events
            .send(TransportEvent::Connected)
            .await
            .unwrap();
        assert!(matches!(
            link.events.recv().await,
            Some(TransportEvent::Connected)
        ));
    }

    #[tokio::test]
    async fn test_drain_discards_until_deadline() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(RelayMessage::ScreenStop).await.unwrap();

        // Queued message is discarded and the deadline is honored
        assert!(drain_outbound_during(&mut rx, Duration::from_millis(20)).await);

        // Dropped sender ends the supervisor
        drop(tx);
        assert!(!drain_outbound_during(&mut rx, Duration::from_secs(5)).await);
    }

    #[test]
    fn test_default_config_backoff_bounds() {
        let config = TransportConfig::default();
        assert!(config.reconnect_base <= config.reconnect_max);
        assert!(config.connect_timeout > Duration::ZERO);
    }
}

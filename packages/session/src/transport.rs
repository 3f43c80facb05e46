//! # Transport
//!
//! A [`Connection`] is a pair of channels: text frames out, transport
//! events in. [`WebSocketConnector`] backs it with a real socket;
//! [`MockConnector`] hands the far end to the caller so tests can play
//! the server.

use crate::errors::TransportError;
use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame
    Message(String),
    Error(String),
    Closed,
}

/// Open duplex channel to a session endpoint
///
/// Dropping `outbound` closes the connection.
#[derive(Debug)]
pub struct Connection {
    pub outbound: UnboundedSender<String>,
    pub inbound: UnboundedReceiver<TransportEvent>,
}

pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>> {
        let url = url.to_string();
        async move {
            let (mut socket, _response) =
                tokio_tungstenite::connect_async(url.as_str())
                    .await
                    .map_err(|e| TransportError::Connect {
                        url: url.clone(),
                        message: e.to_string(),
                    })?;
            tracing::debug!(%url, "WebSocket connected");

            let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
            let (inbound_tx, inbound) = mpsc::unbounded_channel();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        outgoing = outbound_rx.recv() => match outgoing {
                            Some(text) => {
                                if let Err(e) = socket.send(Message::text(text)).await {
                                    let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                                    break;
                                }
                            }
                            None => {
                                let _ = socket.close(None).await;
                                break;
                            }
                        },
                        incoming = socket.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if inbound_tx.send(TransportEvent::Message(text)).is_err() {
                                    let _ = socket.close(None).await;
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                                Ok(text) => {
                                    let _ = inbound_tx.send(TransportEvent::Message(text));
                                }
                                Err(_) => tracing::warn!("Dropping non-UTF-8 binary frame"),
                            },
                            Some(Ok(Message::Close(_))) | None => {
                                let _ = inbound_tx.send(TransportEvent::Closed);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                                break;
                            }
                        },
                    }
                }
                tracing::debug!("WebSocket task finished");
            });

            Ok(Connection { outbound, inbound })
        }
        .boxed()
    }
}

/// In-process connector; every successful connect yields a [`MockPeer`]
pub struct MockConnector {
    peers: UnboundedSender<MockPeer>,
    refuse: bool,
}

impl MockConnector {
    pub fn new() -> (Self, UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers,
                refuse: false,
            },
            rx,
        )
    }

    /// Connector whose every connect attempt fails
    pub fn refusing() -> Self {
        let (peers, _) = mpsc::unbounded_channel();
        Self {
            peers,
            refuse: true,
        }
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>> {
        let result = if self.refuse {
            Err(TransportError::Connect {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        } else {
            let (outbound, from_client) = mpsc::unbounded_channel();
            let (to_client, inbound) = mpsc::unbounded_channel();
            let peer = MockPeer {
                url: url.to_string(),
                to_client,
                from_client,
            };
            match self.peers.send(peer) {
                Ok(()) => Ok(Connection { outbound, inbound }),
                Err(_) => Err(TransportError::Connect {
                    url: url.to_string(),
                    message: "no mock server listening".to_string(),
                }),
            }
        };
        futures::future::ready(result).boxed()
    }
}

/// Server side of a mock connection
pub struct MockPeer {
    pub url: String,
    to_client: UnboundedSender<TransportEvent>,
    from_client: UnboundedReceiver<String>,
}

impl MockPeer {
    pub fn send_event(&self, event_type: &str, data: Value) {
        let frame = serde_json::json!({ "event_type": event_type, "data": data });
        self.send_raw(frame.to_string());
    }

    pub fn send_raw(&self, text: impl Into<String>) {
        let _ = self.to_client.send(TransportEvent::Message(text.into()));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.to_client.send(TransportEvent::Error(message.to_string()));
    }

    pub fn close(&self) {
        let _ = self.to_client.send(TransportEvent::Closed);
    }

    /// Next frame the client sent, parsed as JSON
    pub async fn next_frame(&mut self) -> Option<Value> {
        let text = self.from_client.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Frame already waiting, without blocking
    pub fn try_frame(&mut self) -> Option<Value> {
        let text = self.from_client.try_recv().ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Whether the client side has dropped its sender
    pub fn is_client_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_round_trip() {
        let (connector, mut peers) = MockConnector::new();
        let mut connection = connector.connect("ws://test/ws/compile").await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        assert_eq!(peer.url, "ws://test/ws/compile");

        connection.outbound.send(r#"{"action":"start"}"#.to_string()).unwrap();
        assert_eq!(peer.next_frame().await, Some(json!({"action": "start"})));

        peer.send_event("llm_token", json!({"token": "hi"}));
        peer.close();
        assert!(matches!(
            connection.inbound.recv().await,
            Some(TransportEvent::Message(_))
        ));
        assert_eq!(connection.inbound.recv().await, Some(TransportEvent::Closed));
    }

    #[tokio::test]
    async fn test_refusing_connector() {
        let connector = MockConnector::refusing();
        let error = connector.connect("ws://nowhere").await.unwrap_err();
        assert!(matches!(error, TransportError::Connect { .. }));
    }
}

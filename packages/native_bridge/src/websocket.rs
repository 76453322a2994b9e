//! Per-connection WebSocket handling: each socket is one client channel of
//! the relay.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use relay_core::{Payload, Port, RelayHandle, SendError};

const OUTBOUND_CAPACITY: usize = 100;

enum Outbound {
    Payload(Payload),
    Close,
}

/// Client half of the relay: forwarded payloads are queued for the socket
/// writer task. `close` queues a close sentinel that becomes a WS Close
/// frame, which in turn trips the client's normal disconnect path.
struct WsPort {
    tx: mpsc::Sender<Outbound>,
}

impl Port for WsPort {
    fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.tx
            .try_send(Outbound::Payload(payload))
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Full,
                TrySendError::Closed(_) => SendError::Closed,
            })
    }

    fn close(&self) {
        let _ = self.tx.try_send(Outbound::Close);
    }
}

/// Native-messaging payloads are JSON, so forward them as text frames;
/// anything that is not valid UTF-8 goes out as binary, untouched.
fn payload_message(payload: Payload) -> Message {
    match String::from_utf8(payload) {
        Ok(text) => Message::Text(text.into()),
        Err(raw) => Message::Binary(raw.into_bytes().into()),
    }
}

pub async fn handle_websocket(socket: WebSocket, relay: RelayHandle) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);

    let client = match relay.attach_client(Arc::new(WsPort { tx })).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to attach WebSocket client: {}", e);
            return;
        }
    };
    debug!("WebSocket {} attached", client);

    // Task to forward relayed payloads to the socket
    let output_task = async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                Outbound::Payload(payload) => payload_message(payload),
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    };

    // Task to forward client frames upstream; Close or an error is the
    // client's one-shot disconnect signal.
    let relay_input = relay.clone();
    let input_task = async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    relay_input
                        .client_message(text.as_str().as_bytes().to_vec())
                        .await;
                }
                Ok(Message::Binary(data)) => {
                    relay_input.client_message(data.to_vec()).await;
                }
                Ok(Message::Close(_)) => {
                    debug!("Client closed connection");
                    break;
                }
                Err(e) => {
                    debug!("WebSocket error from client: {}", e);
                    break;
                }
                _ => {} // Ping/Pong are handled by axum
            }
        }
    };

    tokio::select! {
        _ = output_task => debug!("Output task ended for {}", client),
        _ = input_task => debug!("Input task ended for {}", client),
    }

    // Late or duplicate detach for this id is a no-op in the relay
    relay.detach_client(client).await;
    debug!("WebSocket {} detached", client);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payloads_become_text_frames() {
        let message = payload_message(br#"{"error":2,"message":"No Card"}"#.to_vec());
        match message {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"error":2,"message":"No Card"}"#),
            _ => panic!("Expected Text"),
        }
    }

    #[test]
    fn non_utf8_payloads_become_binary_frames() {
        let message = payload_message(vec![0xff, 0xfe, 0x00]);
        match message {
            Message::Binary(data) => assert_eq!(data.to_vec(), vec![0xff, 0xfe, 0x00]),
            _ => panic!("Expected Binary"),
        }
    }

    #[tokio::test]
    async fn ws_port_send_after_writer_drop_reports_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let port = WsPort { tx };
        assert_eq!(port.send(b"x".to_vec()), Err(SendError::Closed));
    }
}

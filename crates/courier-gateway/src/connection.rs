use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use courier_types::InboundEnvelope;

use crate::engine::{Command, CommandSender};
use crate::registry::ClientFrame;

/// Drive one WebSocket client: register it with the engine, forward queued
/// frames to the socket, and hand recognized inbound commands to the engine.
///
/// Malformed or unknown inbound frames are logged and dropped; they never
/// close the connection.
pub(crate) async fn handle_connection(socket: WebSocket, commands: CommandSender) {
    let id = Uuid::new_v4();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();

    if commands
        .send(Command::Attach {
            id,
            sender: frame_tx,
        })
        .is_err()
    {
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    // Engine -> client
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            match frame {
                ClientFrame::Event(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode event for {}: {}", id, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                ClientFrame::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Client -> engine
    let recv_commands = commands.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let msg = match result {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("WebSocket error on {}: {}", id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => match InboundEnvelope::parse(text.as_str()) {
                    Ok(envelope) => match envelope.command() {
                        Some(command) => {
                            if recv_commands.send(Command::Client { id, command }).is_err() {
                                break;
                            }
                        }
                        None => debug!("Unknown message type from {}: {}", id, envelope.kind),
                    },
                    Err(e) => {
                        warn!(
                            "Error parsing message from {}: {} -- raw: {}",
                            id,
                            e,
                            truncate(text.as_str(), 200)
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either side to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let _ = commands.send(Command::Detach { id });
    info!("Client {} disconnected", id);
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("héllo", 2), "hé");
    }
}

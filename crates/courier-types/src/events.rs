use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Events pushed from the sync engine to every attached client.
///
/// Serialized as `{ "type": "...", "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A synthetic message from the live feed. Never persisted.
    NewMessage(Message),

    /// The engine's connectivity flag changed, or a client asked for it.
    ConnectionStatus {
        #[serde(rename = "isConnected")]
        is_connected: bool,
    },
}

/// Raw inbound frame from a client. Uses the same envelope shape as
/// [`SyncEvent`]; only the type tag is read and any payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Commands a client may send to the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Reply to the requesting client with the current connectivity flag.
    RequestStatus,
}

impl InboundEnvelope {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Map the envelope to a known command. Unknown types yield `None`.
    pub fn command(&self) -> Option<SyncCommand> {
        match self.kind.as_str() {
            "connection_status" => Some(SyncCommand::RequestStatus),
            _ => None,
        }
    }
}

use std::collections::HashMap;

use tokio::sync::mpsc;
use uuid::Uuid;

use courier_types::SyncEvent;

pub type ClientId = Uuid;

/// Frames queued for delivery to one client.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Event(SyncEvent),
    /// Ask the client's writer to close the connection.
    Close,
}

pub type ClientSender = mpsc::UnboundedSender<ClientFrame>;

/// Currently attached clients. Owned by the engine's control loop, which is
/// the only place it is mutated.
#[derive(Default)]
pub struct Registry {
    clients: HashMap<ClientId, ClientSender>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ClientId, sender: ClientSender) {
        self.clients.insert(id, sender);
    }

    /// Remove a client. Returns `true` if it was registered.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Send an event to a single client.
    pub fn send_to(&self, id: ClientId, event: SyncEvent) {
        if let Some(tx) = self.clients.get(&id) {
            let _ = tx.send(ClientFrame::Event(event));
        }
    }

    /// Send an event to every attached client. Clients whose writer has gone
    /// away are skipped; their detach is already on its way.
    pub fn broadcast(&self, event: &SyncEvent) {
        for tx in self.clients.values() {
            let _ = tx.send(ClientFrame::Event(event.clone()));
        }
    }

    /// Ask every client to close and forget them. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.clients.len();
        for (_, tx) in self.clients.drain() {
            let _ = tx.send(ClientFrame::Close);
        }
        count
    }
}

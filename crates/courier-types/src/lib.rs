pub mod api;
pub mod events;
pub mod models;

pub use events::{InboundEnvelope, SyncCommand, SyncEvent};
pub use models::{Chat, Message};

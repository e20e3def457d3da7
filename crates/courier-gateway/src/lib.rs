//! Live-update side of courier: a WebSocket listener, the registry of attached
//! clients, a synthetic message feed that runs only while someone listens, and
//! a reconnect state machine with exponential backoff.

pub mod backoff;
pub mod connection;
pub mod engine;
pub mod feed;
pub mod listener;
pub mod registry;

pub use engine::{EngineConfig, EngineError, EngineState, EngineStatus, Subscription, SyncEngine};

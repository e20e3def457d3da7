//! HTTP bridge over the message store: the pull side of the client contract.

pub mod chats;
pub mod error;
pub mod messages;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use courier_db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chats", get(chats::get_chats))
        .route("/chats/{chat_id}/messages", get(messages::get_messages))
        .route("/search", get(messages::search_messages))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

use axum::{
    Json,
    extract::{Path, Query, State},
};

use courier_types::Message;
use courier_types::api::{MAX_PAGE_LIMIT, MessagesQuery, SearchQuery};

use crate::AppState;
use crate::error::ApiResult;

/// One page of a chat's history, oldest first. Pass the `ts` of the oldest
/// message already shown as `before` to fetch the page preceding it.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let db = state.db.clone();
    let limit = query.limit.min(MAX_PAGE_LIMIT);
    let before = query.before;

    let rows =
        tokio::task::spawn_blocking(move || db.get_messages(&chat_id, limit, before)).await??;

    Ok(Json(rows.into_iter().map(Message::from).collect()))
}

pub async fn search_messages(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let db = state.db.clone();
    let limit = query.limit.min(MAX_PAGE_LIMIT);

    let rows =
        tokio::task::spawn_blocking(move || db.search_messages(&query.q, limit)).await??;

    Ok(Json(rows.into_iter().map(Message::from).collect()))
}

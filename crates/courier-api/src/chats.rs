use axum::{
    Json,
    extract::{Query, State},
};

use courier_types::Chat;
use courier_types::api::{ChatsQuery, MAX_PAGE_LIMIT};

use crate::AppState;
use crate::error::ApiResult;

pub async fn get_chats(
    State(state): State<AppState>,
    Query(query): Query<ChatsQuery>,
) -> ApiResult<Json<Vec<Chat>>> {
    // Run blocking DB query off the async runtime
    let db = state.db.clone();
    let limit = query.limit.min(MAX_PAGE_LIMIT);
    let rows = tokio::task::spawn_blocking(move || db.get_chats(limit, query.offset)).await??;

    Ok(Json(rows.into_iter().map(Chat::from).collect()))
}

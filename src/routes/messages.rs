use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Message;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::messages::repository;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub content: String,
}

/// GET /api/places/{id}/messages
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(place_id): Path<i64>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = repository::list(&state.db, user.id, place_id)?;
    Ok(Json(messages))
}

/// POST /api/places/{id}/messages
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(place_id): Path<i64>,
    Json(req): Json<CreateMessageRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let message = repository::create(&state.db, place_id, user.author_name(), &req.content)?;
    Ok(Json(json!({
        "id": message.id,
        "success": true,
        "author": message.author,
        "created_at": message.created_at,
    })))
}

/// DELETE /api/messages/{id}
pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(message_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    repository::delete(&state.db, user.id, message_id)?;
    Ok(Json(json!({ "success": true })))
}

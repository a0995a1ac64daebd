use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Place;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::places::repository::{self, NewPlace};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePlaceRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub note: Option<String>,
    pub rating: Option<f64>,
}

/// GET /api/places
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Place>>> {
    let places = repository::list(&state.db, user.id, user.author_name())?;
    Ok(Json(places))
}

/// POST /api/places
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePlaceRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let place = NewPlace::validate(
        req.lat,
        req.lng,
        req.kind.as_deref(),
        req.name,
        req.note,
        req.rating,
    )?;
    let id = repository::create(&state.db, user.id, user.author_name(), &place)?;
    Ok(Json(json!({ "id": id, "success": true })))
}

/// PUT /api/places/{id} — partial update over the allow-listed fields.
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(place_id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let fields = body
        .as_object()
        .ok_or_else(|| AppError::Validation("Expected a JSON object".into()))?;
    repository::update(&state.db, user.id, place_id, fields)?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/places/{id} — removes the place and its messages.
pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(place_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    repository::delete(&state.db, user.id, place_id)?;
    Ok(Json(json!({ "success": true })))
}

use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::places::repository;
use crate::places::PlaceStats;
use crate::state::AppState;

/// GET /api/stats
pub async fn stats(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<PlaceStats>> {
    let stats = repository::stats(&state.db, user.id)?;
    Ok(Json(stats))
}

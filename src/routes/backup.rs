use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::backup;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// GET /api/export — backup document served as a file download.
pub async fn export(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let doc = backup::export(&state.db, user.id, user.display_name.as_deref())?;
    let filename = format!("love-map-backup-{}.json", Utc::now().format("%Y%m%d"));

    Ok((
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", filename),
        )],
        Json(doc),
    )
        .into_response())
}

/// POST /api/import — multipart upload, field `backup_file`.
pub async fn import(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        if field.name() == Some("backup_file") {
            upload = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?,
            );
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation("Missing backup file".into()))?;
    let doc = backup::parse_document(&upload)?;
    let outcome = backup::import(&state.db, user.id, user.author_name(), &doc)?;

    tracing::info!(
        "User '{}' imported {}/{} places",
        user.username,
        outcome.imported,
        outcome.total
    );

    Ok(Json(json!({
        "success": true,
        "imported": outcome.imported,
        "total": outcome.total,
    })))
}

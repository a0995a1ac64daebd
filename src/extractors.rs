use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use rusqlite::params;

use crate::auth::handlers::cookie_value;
use crate::error::AppError;
use crate::places::ANONYMOUS;
use crate::state::AppState;

/// The currently authenticated user. This is the session check only;
/// per-resource ownership is enforced by the repositories.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// Display-name snapshot used when attributing records.
    pub fn author_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(ANONYMOUS)
    }
}

/// Extractor that requires a valid, unexpired session cookie.
/// Returns 401 otherwise.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_user(state, &parts.headers)?.ok_or(AppError::Unauthenticated)
    }
}

/// Non-failing session lookup for page routes that redirect instead of
/// returning 401.
pub fn session_user(state: &AppState, headers: &HeaderMap) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = cookie_value(headers, &state.config.auth.cookie_name) else {
        return Ok(None);
    };

    let conn = state.db.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.username, u.display_name FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(CurrentUser {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    display_name: row.get(2)?,
                })
            },
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(user)
}

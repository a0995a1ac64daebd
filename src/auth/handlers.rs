use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

/// Hash verified when the username does not exist, so both failure paths cost
/// a bcrypt comparison.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        bcrypt::hash("lovemap-dummy-password", bcrypt::DEFAULT_COST)
            .unwrap_or_else(|_| String::new())
    })
}

/// POST /api/login — verify credentials, establish a 7-day session.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let (username, password) = match (req.username, req.password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => {
            return Err(AppError::Validation(
                "Username and password are required".into(),
            ))
        }
    };

    let conn = state.db.get()?;
    let user: Option<(i64, String, Option<String>)> = conn
        .query_row(
            "SELECT id, password_hash, display_name FROM users WHERE username = ?1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let (user_id, display_name) = match user {
        Some((id, hash, display_name)) => {
            if !bcrypt::verify(&password, &hash).unwrap_or(false) {
                return Err(AppError::Authentication);
            }
            (id, display_name)
        }
        None => {
            let _ = bcrypt::verify(&password, dummy_hash());
            return Err(AppError::Authentication);
        }
    };

    conn.execute(
        "UPDATE users SET last_login = datetime('now') WHERE id = ?1",
        params![user_id],
    )?;
    drop(conn);

    let token = session::create_session(&state.db, user_id, state.config.session_hours())?;
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.session_hours(),
    );

    tracing::info!("User '{}' logged in", username);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "display_name": display_name })),
    )
        .into_response())
}

/// POST /api/logout — invalidate the current session, if any.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = cookie_value(&headers, &state.config.auth.cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
        Json(json!({ "success": true })),
    )
        .into_response())
}

/// GET /api/user — identity of the current session.
pub async fn current_user(user: CurrentUser) -> Json<serde_json::Value> {
    Json(json!({
        "username": user.username,
        "display_name": user.display_name,
    }))
}

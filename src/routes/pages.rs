use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::error::AppResult;
use crate::extractors::session_user;
use crate::state::AppState;

const LOGIN_PAGE: &str = include_str!("../../assets/login.html");
const INDEX_PAGE: &str = include_str!("../../assets/index.html");

/// GET / — the map page, or a redirect to /login without a session.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if session_user(&state, &headers)?.is_none() {
        return Ok(Redirect::to("/login").into_response());
    }
    Ok(Html(INDEX_PAGE).into_response())
}

/// GET /login — minimal built-in login form. Already-authenticated visitors
/// go straight to the map.
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if session_user(&state, &headers)?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(Html(LOGIN_PAGE).into_response())
}

pub mod backup;
pub mod messages;
pub mod pages;
pub mod places;
pub mod stats;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login_page))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/user", get(handlers::current_user))
        .route("/api/places", get(places::list).post(places::create))
        .route(
            "/api/places/{id}",
            put(places::update).delete(places::remove),
        )
        .route(
            "/api/places/{id}/messages",
            get(messages::list).post(messages::create),
        )
        .route("/api/messages/{id}", delete(messages::remove))
        .route("/api/export", get(backup::export))
        .route("/api/import", post(backup::import))
        .route("/api/stats", get(stats::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! End-to-end tests over the axum router: login, ownership isolation,
//! cascade delete, backup round-trip.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rusqlite::params;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use lovemap::config::Config;
use lovemap::routes;
use lovemap::state::AppState;
use lovemap::{db, state::DbPool};

const PASSWORD: &str = "correct horse battery staple";

struct TestApp {
    router: Router,
    pool: DbPool,
    _temp: TempDir,
}

fn test_app() -> TestApp {
    let temp = TempDir::new().unwrap();
    let pool = db::create_pool(&temp.path().join("test.db")).unwrap();
    db::run_migrations(&pool).unwrap();

    let state = AppState {
        db: pool.clone(),
        config: Config::default(),
    };
    TestApp {
        router: routes::router(state),
        pool,
        _temp: temp,
    }
}

fn seed_user(pool: &DbPool, username: &str, display_name: &str) -> i64 {
    // Low cost keeps the test suite fast; production uses DEFAULT_COST
    let hash = bcrypt::hash(PASSWORD, 4).unwrap();
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO users (username, password_hash, display_name) VALUES (?1, ?2, ?3)",
        params![username, hash, display_name],
    )
    .unwrap();
    conn.last_insert_rowid()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &TestApp, username: &str) -> String {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "username": username, "password": PASSWORD }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn request(
    app: &TestApp,
    method: &str,
    path: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    app.router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn protected_routes_reject_missing_session() {
    let app = test_app();

    for path in ["/api/user", "/api/places", "/api/stats", "/api/export"] {
        let response = request(&app, "GET", path, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", path);
    }
}

#[tokio::test]
async fn login_failure_does_not_reveal_which_usernames_exist() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");

    let wrong_password = request(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": "alice", "password": "nope" })),
    )
    .await;
    let unknown_user = request(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": "nobody", "password": "nope" })),
    )
    .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(wrong_password).await,
        body_json(unknown_user).await
    );
}

#[tokio::test]
async fn login_missing_fields_is_400() {
    let app = test_app();
    let response = request(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_returns_display_name_and_sets_last_login() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");

    let response = request(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": "alice", "password": PASSWORD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["display_name"], json!("Alice"));

    let conn = app.pool.get().unwrap();
    let last_login: Option<String> = conn
        .query_row(
            "SELECT last_login FROM users WHERE username = 'alice'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(last_login.is_some());
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    let cookie = login(&app, "alice").await;

    let response = request(&app, "GET", "/api/user", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(&app, "POST", "/api/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(&app, "GET", "/api/user", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn place_crud_is_ownership_isolated() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    seed_user(&app.pool, "bob", "Bob");
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    let response = request(
        &app,
        "POST",
        "/api/places",
        Some(&alice),
        Some(json!({ "lat": 31.2, "lng": 121.5, "type": "heart", "name": "bund" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let place_id = body_json(response).await["id"].as_i64().unwrap();

    // Bob sees nothing
    let response = request(&app, "GET", "/api/places", Some(&bob), None).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);

    // Bob cannot update or delete Alice's place, even though it exists
    let response = request(
        &app,
        "PUT",
        &format!("/api/places/{}", place_id),
        Some(&bob),
        Some(json!({ "name": "mine now" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(
        &app,
        "DELETE",
        &format!("/api/places/{}", place_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Alice still sees her place, with her display-name snapshot
    let response = request(&app, "GET", "/api/places", Some(&alice), None).await;
    let places = body_json(response).await;
    assert_eq!(places.as_array().unwrap().len(), 1);
    assert_eq!(places[0]["created_by"], json!("Alice"));
    assert_eq!(places[0]["type"], json!("heart"));
}

#[tokio::test]
async fn place_creation_validates_type_and_coordinates() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    let cookie = login(&app, "alice").await;

    for body in [
        json!({ "lat": 1.0, "lng": 2.0, "type": "dog" }),
        json!({ "lng": 2.0, "type": "heart" }),
        json!({ "lat": 0.0, "lng": 2.0, "type": "heart" }),
    ] {
        let response = request(&app, "POST", "/api/places", Some(&cookie), Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    for kind in ["heart", "paw"] {
        let response = request(
            &app,
            "POST",
            "/api/places",
            Some(&cookie),
            Some(json!({ "lat": 1.0, "lng": 2.0, "type": kind })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn fractional_ratings_survive_create_update_list_and_export() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    let cookie = login(&app, "alice").await;

    let response = request(
        &app,
        "POST",
        "/api/places",
        Some(&cookie),
        Some(json!({ "lat": 1.0, "lng": 2.0, "type": "paw", "rating": 3.5 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let place_id = body_json(response).await["id"].as_i64().unwrap();

    let response = request(
        &app,
        "PUT",
        &format!("/api/places/{}", place_id),
        Some(&cookie),
        Some(json!({ "rating": 4.5 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The updated row must still list and export
    let response = request(&app, "GET", "/api/places", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let places = body_json(response).await;
    assert_eq!(places[0]["rating"], json!(4.5));

    let response = request(&app, "GET", "/api/export", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let document = body_json(response).await;
    assert_eq!(document["places"][0]["rating"], json!(4.5));

    // A non-numeric rating is rejected up front
    let response = request(
        &app,
        "PUT",
        &format!("/api/places/{}", place_id),
        Some(&cookie),
        Some(json!({ "rating": "five" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_place_removes_its_messages() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    let cookie = login(&app, "alice").await;

    let response = request(
        &app,
        "POST",
        "/api/places",
        Some(&cookie),
        Some(json!({ "lat": 1.0, "lng": 2.0, "type": "paw", "name": "spot" })),
    )
    .await;
    let place_id = body_json(response).await["id"].as_i64().unwrap();

    let response = request(
        &app,
        "POST",
        &format!("/api/places/{}/messages", place_id),
        Some(&cookie),
        Some(json!({ "content": "we went here!" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(
        &app,
        "DELETE",
        &format!("/api/places/{}", place_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let conn = app.pool.get().unwrap();
    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM messages WHERE place_id = ?1",
            params![place_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);

    // Listing messages for the gone place is a 403, same as a foreign one
    let response = request(
        &app,
        "GET",
        &format!("/api/places/{}/messages", place_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn message_validation_and_missing_place() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    let cookie = login(&app, "alice").await;

    let response = request(
        &app,
        "POST",
        "/api/places/9999/messages",
        Some(&cookie),
        Some(json!({ "content": "hello" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = request(
        &app,
        "POST",
        "/api/places",
        Some(&cookie),
        Some(json!({ "lat": 1.0, "lng": 2.0, "type": "heart" })),
    )
    .await;
    let place_id = body_json(response).await["id"].as_i64().unwrap();

    let path = format!("/api/places/{}/messages", place_id);
    let response = request(
        &app,
        "POST",
        &path,
        Some(&cookie),
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = request(
        &app,
        "POST",
        &path,
        Some(&cookie),
        Some(json!({ "content": "x".repeat(501) })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = request(
        &app,
        "POST",
        &path,
        Some(&cookie),
        Some(json!({ "content": "x".repeat(500) })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["author"], json!("Alice"));
}

#[tokio::test]
async fn anyone_may_comment_on_an_existing_place() {
    // Pins the asymmetry: message creation skips the ownership check that
    // message listing and deletion enforce.
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    seed_user(&app.pool, "bob", "Bob");
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    let response = request(
        &app,
        "POST",
        "/api/places",
        Some(&alice),
        Some(json!({ "lat": 1.0, "lng": 2.0, "type": "heart" })),
    )
    .await;
    let place_id = body_json(response).await["id"].as_i64().unwrap();

    let response = request(
        &app,
        "POST",
        &format!("/api/places/{}/messages", place_id),
        Some(&bob),
        Some(json!({ "content": "drive-by" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let message_id = body_json(response).await["id"].as_i64().unwrap();

    // But Bob can neither read nor delete on Alice's place
    let response = request(
        &app,
        "GET",
        &format!("/api/places/{}/messages", place_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(
        &app,
        "DELETE",
        &format!("/api/messages/{}", message_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(
        &app,
        "DELETE",
        &format!("/api/messages/{}", message_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stats_reflect_heart_and_paw_counts() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    let cookie = login(&app, "alice").await;

    let response = request(&app, "GET", "/api/stats", Some(&cookie), None).await;
    let body = body_json(response).await;
    assert_eq!(body["want_to_go"], json!(0));
    assert_eq!(body["completion_rate"], json!(0.0));

    for i in 0..3 {
        request(
            &app,
            "POST",
            "/api/places",
            Some(&cookie),
            Some(json!({ "lat": 1.0 + i as f64, "lng": 2.0, "type": "heart" })),
        )
        .await;
    }
    for i in 0..2 {
        request(
            &app,
            "POST",
            "/api/places",
            Some(&cookie),
            Some(json!({ "lat": 10.0 + i as f64, "lng": 2.0, "type": "paw" })),
        )
        .await;
    }

    let response = request(&app, "GET", "/api/stats", Some(&cookie), None).await;
    let body = body_json(response).await;
    assert_eq!(body["want_to_go"], json!(3));
    assert_eq!(body["visited"], json!(2));
    assert_eq!(body["completion_rate"], json!(40.0));
}

#[tokio::test]
async fn export_import_round_trip_over_http() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    seed_user(&app.pool, "bob", "Bob");
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    for (lat, name) in [(31.2, "bund"), (39.9, "hutong")] {
        request(
            &app,
            "POST",
            "/api/places",
            Some(&alice),
            Some(json!({ "lat": lat, "lng": 121.5, "type": "heart", "name": name })),
        )
        .await;
    }

    let response = request(&app, "GET", "/api/export", Some(&alice), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=love-map-backup-"));
    assert!(disposition.ends_with(".json"));
    let document = body_json(response).await;
    assert_eq!(document["version"], json!("1.0"));
    assert_eq!(document["user"], json!("Alice"));
    assert_eq!(document["places"].as_array().unwrap().len(), 2);

    // Import the document into Bob's account, twice
    for (pass, expected_imported) in [(1, 2), (2, 0)] {
        let boundary = "lovemap-test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"backup_file\"; filename=\"backup.json\"\r\nContent-Type: application/json\r\n\r\n{doc}\r\n--{b}--\r\n",
            b = boundary,
            doc = document
        );
        let response = app
            .router
            .clone()
            .oneshot(
                Request::post("/api/import")
                    .header(header::COOKIE, &bob)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "pass {}", pass);
        let outcome = body_json(response).await;
        assert_eq!(outcome["imported"], json!(expected_imported));
        assert_eq!(outcome["total"], json!(2));
    }

    let response = request(&app, "GET", "/api/places", Some(&bob), None).await;
    let places = body_json(response).await;
    assert_eq!(places.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn import_rejects_malformed_documents() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");
    let cookie = login(&app, "alice").await;

    let boundary = "lovemap-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"backup_file\"; filename=\"backup.json\"\r\n\r\n{{\"places\": [{{\"lng\": 1.0}}]}}\r\n--{b}--\r\n",
        b = boundary
    );
    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/import")
                .header(header::COOKIE, &cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = body_json(response).await;
    assert!(error["error"].as_str().unwrap().contains("Import failed"));

    // Missing file field is a 400
    let empty = format!("--{b}--\r\n", b = boundary);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/import")
                .header(header::COOKIE, &cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(empty))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_page_and_root_redirects() {
    let app = test_app();
    seed_user(&app.pool, "alice", "Alice");

    let response = request(&app, "GET", "/", None, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");

    let response = request(&app, "GET", "/login", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = login(&app, "alice").await;
    let response = request(&app, "GET", "/login", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
}

//! HTTP-level tests against the full router over in-memory SQLite

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use keel::api::{build_router, AppState};
use keel::config::Config;
use keel::db::{create_test_pool, migrations, DynDatabasePool};

async fn setup() -> TestServer {
    setup_with_pool().await.0
}

async fn setup_with_pool() -> (TestServer, DynDatabasePool) {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let mut config = Config::default();
    config.jwt.secret = "integration-test-secret-0123456789abcdef".to_string();

    let state = AppState::from_config(pool.clone(), &config).expect("Failed to build state");
    let app = build_router(state, &config.server).expect("Failed to build router");
    let server = TestServer::new(app).expect("Failed to start test server");
    (server, pool)
}

/// Register `username` and return (user, access token, refresh token)
async fn register(server: &TestServer, username: &str) -> (Value, String, String) {
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password123",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    let access = body["tokens"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["tokens"]["refresh_token"].as_str().unwrap().to_string();
    (body["user"].clone(), access, refresh)
}

#[tokio::test]
async fn test_health() {
    let server = setup().await;
    let response = server.get("/api/v1/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_health_reports_unavailable_database() {
    let (server, pool) = setup_with_pool().await;
    pool.close().await;

    let response = server.get("/api/v1/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "unavailable");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let server = setup().await;

    let response = server.get("/api/v1/auth/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    server
        .post("/api/v1/articles")
        .authorization_bearer("not-a-jwt")
        .json(&json!({"title": "x", "content": "y"}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let server = setup().await;
    let (admin, _, _) = register(&server, "admin").await;
    assert_eq!(admin["role"], "admin");
    assert!(admin.get("password_hash").is_none());

    let (user, _, _) = register(&server, "alice").await;
    assert_eq!(user["role"], "user");

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({"login": "alice@example.com", "password": "password123"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["tokens"]["token_type"], "Bearer");
    let token = body["tokens"]["access_token"].as_str().unwrap();

    let me: Value = server
        .get("/api/v1/auth/me")
        .authorization_bearer(token)
        .await
        .json();
    assert_eq!(me["username"], "alice");

    let wrong = server
        .post("/api/v1/auth/login")
        .json(&json!({"login": "alice", "password": "wrongpass1"}))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let server = setup().await;
    register(&server, "alice").await;

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "password123",
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_refresh_token_rotation() {
    let server = setup().await;
    let (_, _, refresh) = register(&server, "alice").await;

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({"refresh_token": refresh}))
        .await;
    response.assert_status_ok();
    let rotated: Value = response.json();
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), refresh);

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({"refresh_token": refresh}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let server = setup().await;
    let (_, access, refresh) = register(&server, "alice").await;

    server
        .post("/api/v1/auth/logout")
        .authorization_bearer(&access)
        .json(&json!({"refresh_token": refresh}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({"refresh_token": refresh}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_input_is_validation_error() {
    let server = setup().await;

    let response = server
        .post("/api/v1/auth/login")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Invalid request body");
    assert!(body["error"]["details"]["reason"].is_string());

    let response = server.get("/api/v1/products/abc").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Invalid path parameter");
}

#[tokio::test]
async fn test_article_lifecycle() {
    let server = setup().await;
    let (_, _admin_token, _) = register(&server, "admin").await;
    let (_, token, _) = register(&server, "alice").await;

    let response = server
        .post("/api/v1/articles")
        .authorization_bearer(&token)
        .json(&json!({"title": "Hello World", "content": "First post"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let article: Value = response.json();
    assert_eq!(article["status"], "draft");
    assert_eq!(article["slug"], "hello-world");
    let id = article["id"].as_i64().unwrap();

    // Drafts are hidden from anonymous readers but visible to the author
    server
        .get(&format!("/api/v1/articles/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api/v1/articles/{}", id))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();

    // Publishing without a featured image is rejected
    server
        .post(&format!("/api/v1/articles/{}/publish", id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let updated: Value = server
        .put(&format!("/api/v1/articles/{}", id))
        .authorization_bearer(&token)
        .json(&json!({"featured_image": "https://cdn.example.com/cover.png"}))
        .await
        .json();
    assert_eq!(updated["title"], "Hello World");

    let published: Value = server
        .post(&format!("/api/v1/articles/{}/publish", id))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(published["status"], "published");
    assert!(published["published_at"].is_string());

    let viewed: Value = server.get("/api/v1/articles/slug/hello-world").await.json();
    assert_eq!(viewed["view_count"], 1);

    let list: Value = server.get("/api/v1/articles").await.json();
    assert_eq!(list["total"], 1);
    assert_eq!(list["page"], 1);
    assert_eq!(list["per_page"], 20);

    server
        .delete(&format!("/api/v1/articles/{}", id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/api/v1/articles/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_status_filter_is_admin_only() {
    let server = setup().await;
    let (_, admin_token, _) = register(&server, "admin").await;
    let (_, token, _) = register(&server, "alice").await;

    server
        .post("/api/v1/articles")
        .authorization_bearer(&token)
        .json(&json!({"title": "Draft", "content": "Body"}))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .get("/api/v1/articles?status=draft")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let drafts: Value = server
        .get("/api/v1/articles?status=draft")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(drafts["total"], 1);
}

#[tokio::test]
async fn test_other_users_cannot_edit_article() {
    let server = setup().await;
    register(&server, "admin").await;
    let (_, alice, _) = register(&server, "alice").await;
    let (_, bob, _) = register(&server, "bob").await;

    let article: Value = server
        .post("/api/v1/articles")
        .authorization_bearer(&alice)
        .json(&json!({"title": "Mine", "content": "Body"}))
        .await
        .json();

    server
        .put(&format!("/api/v1/articles/{}", article["id"]))
        .authorization_bearer(&bob)
        .json(&json!({"title": "Stolen"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_categories_admin_only_writes() {
    let server = setup().await;
    let (_, admin, _) = register(&server, "admin").await;
    let (_, user, _) = register(&server, "alice").await;

    server
        .post("/api/v1/categories")
        .authorization_bearer(&user)
        .json(&json!({"name": "News"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post("/api/v1/categories")
        .authorization_bearer(&admin)
        .json(&json!({"name": "News"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let category: Value = response.json();
    assert_eq!(category["slug"], "news");
    let id = category["id"].as_i64().unwrap();

    let by_slug: Value = server.get("/api/v1/categories/slug/news").await.json();
    assert_eq!(by_slug["id"], id);
    server
        .get("/api/v1/categories/slug/missing")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let article: Value = server
        .post("/api/v1/articles")
        .authorization_bearer(&user)
        .json(&json!({"title": "Filed", "content": "Body", "category_id": id}))
        .await
        .json();

    server
        .delete(&format!("/api/v1/categories/{}", id))
        .authorization_bearer(&admin)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let article: Value = server
        .get(&format!("/api/v1/articles/{}", article["id"]))
        .authorization_bearer(&user)
        .await
        .json();
    assert!(article["category_id"].is_null());

    let list: Value = server.get("/api/v1/categories").await.json();
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_product_crud() {
    let server = setup().await;
    let (_, admin, _) = register(&server, "admin").await;

    server
        .post("/api/v1/products")
        .json(&json!({"name": "Widget", "sku": "wid-1", "price_cents": 100}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/v1/products")
        .authorization_bearer(&admin)
        .json(&json!({"name": "Widget", "sku": "WID-1", "price_cents": -1}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/products")
        .authorization_bearer(&admin)
        .json(&json!({"name": "Widget", "sku": "wid-1", "price_cents": 1999, "stock": 3}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let product: Value = response.json();
    assert_eq!(product["sku"], "WID-1");
    let id = product["id"].as_i64().unwrap();

    let updated: Value = server
        .put(&format!("/api/v1/products/{}", id))
        .authorization_bearer(&admin)
        .json(&json!({"stock": 7}))
        .await
        .json();
    assert_eq!(updated["stock"], 7);
    assert_eq!(updated["price_cents"], 1999);

    let filtered: Value = server
        .get("/api/v1/products?min_price=2000")
        .await
        .json();
    assert_eq!(filtered["total"], 0);

    server
        .delete(&format!("/api/v1/products/{}", id))
        .authorization_bearer(&admin)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/api/v1/products/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_management() {
    let server = setup().await;
    let (admin, admin_token, _) = register(&server, "admin").await;
    let (alice, alice_token, _) = register(&server, "alice").await;

    server
        .get("/api/v1/users")
        .authorization_bearer(&alice_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let users: Value = server
        .get("/api/v1/users?role=user")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(users["total"], 1);

    server
        .get(&format!("/api/v1/users/{}", admin["id"]))
        .authorization_bearer(&alice_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let renamed: Value = server
        .put(&format!("/api/v1/users/{}", alice["id"]))
        .authorization_bearer(&alice_token)
        .json(&json!({"full_name": "Alice Liddell"}))
        .await
        .json();
    assert_eq!(renamed["full_name"], "Alice Liddell");

    server
        .delete(&format!("/api/v1/users/{}", alice["id"]))
        .authorization_bearer(&admin_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    // The deleted account's access token no longer authenticates
    server
        .get("/api/v1/auth/me")
        .authorization_bearer(&alice_token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let server = setup().await;
    let (_, token, refresh) = register(&server, "alice").await;

    server
        .put("/api/v1/auth/password")
        .authorization_bearer(&token)
        .json(&json!({"current_password": "password123", "new_password": "newpass456"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({"refresh_token": refresh}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/v1/auth/login")
        .json(&json!({"login": "alice", "password": "newpass456"}))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let server = setup().await;
    let response = server.get("/api/v1/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

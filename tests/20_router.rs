use std::sync::Once;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use uuid::Uuid;

use lifestyle_api::auth::{generate_jwt_with_secret, Claims};

static INIT: Once = Once::new();

/// Router with a known signing secret; config is read once per process
fn router() -> Router {
    INIT.call_once(|| {
        std::env::set_var("JWT_SECRET", "router-test-secret");
        std::env::remove_var("JWT_AUDIENCE");
    });
    lifestyle_api::app()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn root_is_public() {
    let response = router()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["endpoints"]["notes"].is_string());
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let response = router()
        .oneshot(Request::get("/api/todos").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn non_bearer_scheme_is_unauthorized() {
    let response = router()
        .oneshot(
            Request::get("/api/events")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let claims = Claims::new(Uuid::new_v4(), Some("sam@example.com".to_string()));
    let token = generate_jwt_with_secret(&claims, "some-other-secret").unwrap();

    let response = router()
        .oneshot(
            Request::post("/api/shopping")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"milk"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let response = router()
        .oneshot(Request::get("/api/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

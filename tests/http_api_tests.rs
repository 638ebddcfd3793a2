/// HTTP-level tests driving the axum router
mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use common::{google_profile, setup, setup_with, StubIdentity, PASSWORD};
use research_auth::{config::ServerConfig, server::build_router};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_and_not_found() {
    let env = setup().await;
    let app = build_router(env.ctx.clone());

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, get("/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_login_flow_over_http() {
    let env = setup().await;
    env.local_user("ada@lab.org").await;
    let app = build_router(env.ctx.clone());

    let (status, body) = send(
        &app,
        post(
            "/api/auth/login/init",
            json!({"email": "ada@lab.org", "password": PASSWORD}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["challengeRequired"], true);
    assert_eq!(body["deliveryChannel"], "email");
    assert_eq!(body["maskedDestination"], "ad*@lab.org");
    assert!(body.get("code").is_none());
    let challenge_token = body["challengeToken"].as_str().unwrap().to_string();

    let code = env.mailer.last_code(6).await;
    let (status, session) = send(
        &app,
        post(
            "/api/auth/login/verify",
            json!({"challengeToken": challenge_token, "code": code}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["email"], "ada@lab.org");
    assert_eq!(session["user"]["displayName"], "Ada Lovelace");
    assert_eq!(session["user"]["provider"], "local");
    assert!(session["expiresAt"].is_string());

    let access = session["accessToken"].as_str().unwrap();
    let (status, me) = send(&app, get("/api/auth/me", Some(access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@lab.org");
    assert_eq!(me["roleName"], "User");

    let refresh_token = session["refreshToken"].as_str().unwrap();
    let (status, rotated) = send(
        &app,
        post("/api/auth/refresh", json!({"refreshToken": refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refreshToken"], session["refreshToken"]);

    let (status, body) = send(
        &app,
        post("/api/auth/refresh", json!({"refreshToken": refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidRefreshToken");

    let new_refresh = rotated["refreshToken"].as_str().unwrap();
    let (status, body) = send(
        &app,
        post("/api/auth/logout", json!({"refreshToken": new_refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_logout_reports_whether_session_existed() {
    let identity =
        StubIdentity::default().with_profile("tok-1", google_profile("g-1", "grace@lab.org"));
    let env = setup_with(ServerConfig::for_testing(), identity).await;
    let session = env.ctx.auth.google_login("tok-1").await.unwrap();
    let app = build_router(env.ctx.clone());

    let (status, body) = send(
        &app,
        post("/api/auth/logout", json!({"refreshToken": session.refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(
        &app,
        post("/api/auth/logout", json!({"refreshToken": session.refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app,
        post("/api/auth/logout", json!({"refreshToken": "never-issued"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_code_failures_look_identical() {
    let env = setup().await;
    env.local_user("ada@lab.org").await;
    let app = build_router(env.ctx.clone());

    let (_, body) = send(
        &app,
        post(
            "/api/auth/login/init",
            json!({"email": "ada@lab.org", "password": PASSWORD}),
        ),
    )
    .await;
    let token = body["challengeToken"].as_str().unwrap().to_string();
    let code = env.mailer.last_code(6).await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let (wrong_status, wrong_body) = send(
        &app,
        post(
            "/api/auth/login/verify",
            json!({"challengeToken": token, "code": wrong}),
        ),
    )
    .await;
    let (missing_status, missing_body) = send(
        &app,
        post(
            "/api/auth/login/verify",
            json!({"challengeToken": "does-not-exist", "code": code}),
        ),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, missing_status);
    assert_eq!(wrong_body, missing_body);
    assert_eq!(wrong_body["error"], "InvalidCode");
}

#[tokio::test]
async fn test_bad_credentials_rejected() {
    let env = setup().await;
    env.local_user("ada@lab.org").await;
    let app = build_router(env.ctx.clone());

    let (status, body) = send(
        &app,
        post(
            "/api/auth/login/init",
            json!({"email": "ada@lab.org", "password": "not-it"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidCredentials");

    let (status, _) = send(
        &app,
        post("/api/auth/login/init", json!({"email": "", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_over_http() {
    let env = setup().await;
    let app = build_router(env.ctx.clone());

    let body = json!({
        "firstName": "Marie",
        "lastName": "Curie",
        "email": "marie@lab.org",
        "password": "radium-1898",
        "roleId": 2
    });

    let (status, session) = send(&app, post("/api/auth/register", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["firstName"], "Marie");
    assert_eq!(session["user"]["roleId"], 2);

    let (status, error) = send(&app, post("/api/auth/register", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "EmailAlreadyRegistered");

    let (status, _) = send(
        &app,
        post(
            "/api/auth/register",
            json!({
                "firstName": "Pierre",
                "lastName": "Curie",
                "email": "pierre@lab.org",
                "password": "short",
                "roleId": 2
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, error) = send(
        &app,
        post(
            "/api/auth/register",
            json!({
                "firstName": "Pierre",
                "lastName": "Curie",
                "email": "pierre@lab.org",
                "password": "radium-1898",
                "roleId": 77
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "InvalidRole");
}

#[tokio::test]
async fn test_protected_routes_require_bearer() {
    let env = setup().await;
    let app = build_router(env.ctx.clone());

    let (status, body) = send(&app, get("/api/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AuthenticationRequired");

    let (status, _) = send(&app, get("/api/auth/me", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        post(
            "/api/auth/change-password",
            json!({"currentPassword": "a", "newPassword": "bbbbbbbbbb"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_over_http() {
    let env = setup().await;
    let app = build_router(env.ctx.clone());

    let (_, session) = send(
        &app,
        post(
            "/api/auth/register",
            json!({
                "firstName": "Marie",
                "lastName": "Curie",
                "email": "marie@lab.org",
                "password": "radium-1898",
                "roleId": 2
            }),
        ),
    )
    .await;
    let access = session["accessToken"].as_str().unwrap().to_string();

    let change = |current: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/auth/change-password")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", access))
            .body(Body::from(
                json!({"currentPassword": current, "newPassword": "polonium-1898"}).to_string(),
            ))
            .unwrap()
    };

    let (status, _) = send(&app, change("wrong-password")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, change("radium-1898")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_google_routes() {
    let identity =
        StubIdentity::default().with_profile("ya29.good", google_profile("g-7", "grace@lab.org"));
    let env = setup_with(ServerConfig::for_testing(), identity).await;
    let app = build_router(env.ctx.clone());

    let (status, session) = send(
        &app,
        post("/api/auth/google-login", json!({"externalToken": "ya29.good"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["provider"], "google");
    assert_eq!(session["user"]["profilePictureUrl"], "https://example.com/grace.png");

    let (status, body) = send(
        &app,
        post("/api/auth/google-login", json!({"googleToken": "ya29.bad"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidExternalToken");

    let (status, body) = send(&app, get("/api/auth/google-auth-url", None)).await;
    assert_eq!(status, StatusCode::OK);
    let url = body["authUrl"].as_str().unwrap();
    assert!(url.contains("client_id=test-client-id"));
    assert!(url.contains("access_type=offline"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let env = setup().await;
    let app = build_router(env.ctx.clone());

    send(&app, get("/health", None)).await;

    let response = app.clone().oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}

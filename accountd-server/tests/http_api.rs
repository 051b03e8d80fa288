//! End-to-end tests of the HTTP surface

use accountd_core::test_utils::*;
use accountd_core::*;
use accountd_engine::StorageEngine;
use accountd_server::{handle_request, AccountServer};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

struct TestResponse {
    status: StatusCode,
    body: Value,
}

async fn send(service: &AccountService, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
    let raw = body.map(|b| b.to_string()).unwrap_or_default();
    send_raw(service, method, path, token, raw).await
}

async fn send_raw(service: &AccountService, method: Method, path: &str, token: Option<&str>, body: String) -> TestResponse {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = builder.body(Full::new(Bytes::from(body))).unwrap();

    let response = handle_request(req, service.clone()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse { status, body }
}

async fn register(service: &AccountService, email: &str) -> (String, String) {
    let response = send(
        service,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": email, "password": "secret1", "name": "A"})),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let token = response.body["access_token"].as_str().unwrap().to_string();
    let id = response.body["user"]["id"].as_str().unwrap().to_string();
    (token, id)
}

fn admin_token(service: &AccountService) -> String {
    let admin = service
        .ensure_admin(NewAccount {
            email: "root@x.com".to_string(),
            password: "secret1".to_string(),
            name: "Root".to_string(),
        })
        .unwrap()
        .unwrap();
    service.issuer().issue(&admin_principal(&admin)).unwrap().token().to_string()
}

#[tokio::test]
async fn register_login_update_scenario() {
    let service = test_service();

    let registered = send(
        &service,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "a@x.com", "password": "secret1", "name": "A"})),
    )
    .await;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["token_type"], "Bearer");
    assert_eq!(registered.body["expires_in"], 3600);
    assert_eq!(registered.body["user"]["email"], "a@x.com");
    assert_eq!(registered.body["user"]["role"], "USER");
    assert!(registered.body["user"].get("password_hash").is_none());
    let owner_id = registered.body["user"]["id"].as_str().unwrap().to_string();

    let login = send(
        &service,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "a@x.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(login.status, StatusCode::CREATED);
    let owner_token = login.body["access_token"].as_str().unwrap().to_string();
    assert!(login.body.get("user").is_none());
    let principal = service.authenticate_token(&owner_token).unwrap();
    assert_eq!(principal.id.to_string(), owner_id);

    let (other_token, _) = register(&service, "b@x.com").await;
    let path = format!("/users/{}", owner_id);

    let denied = send(&service, Method::PATCH, &path, Some(&other_token), Some(json!({"name": "B"}))).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["error"], "forbidden");

    let updated = send(&service, Method::PATCH, &path, Some(&owner_token), Some(json!({"name": "Owner"}))).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["name"], "Owner");
    assert_eq!(updated.body["id"], owner_id.as_str());
}

#[tokio::test]
async fn login_failures_look_identical() {
    let service = test_service();
    register(&service, "a@x.com").await;

    let wrong_password = send(
        &service,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "a@x.com", "password": "wrong-one"})),
    )
    .await;
    let unknown_email = send(
        &service,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "ghost@x.com", "password": "wrong-one"})),
    )
    .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.body["error"], "invalid_credentials");
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let service = test_service();
    register(&service, "a@x.com").await;

    let again = send(
        &service,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "A@X.com", "password": "secret1", "name": "A"})),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.body["error"], "email_taken");

    let created = send(
        &service,
        Method::POST,
        "/users",
        None,
        Some(json!({"email": "a@x.com", "password": "secret1", "name": "A"})),
    )
    .await;
    assert_eq!(created.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn validation_errors_are_bad_request() {
    let service = test_service();

    let short = send(
        &service,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "a@x.com", "password": "12345", "name": "A"})),
    )
    .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert_eq!(short.body["error"], "validation_error");

    let bad_email = send(
        &service,
        Method::POST,
        "/users",
        None,
        Some(json!({"email": "not-an-email", "password": "secret1", "name": "A"})),
    )
    .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let malformed = send_raw(&service, Method::POST, "/auth/login", None, "{not json".to_string()).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let missing_field = send(&service, Method::POST, "/auth/login", None, Some(json!({"email": "a@x.com"}))).await;
    assert_eq!(missing_field.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn authenticated_routes_require_a_valid_token() {
    let service = test_service();
    let (_, id) = register(&service, "a@x.com").await;
    let path = format!("/users/{}", id);

    let missing = send(&service, Method::DELETE, &path, None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"], "token_invalid");

    let garbage = send(&service, Method::PATCH, &path, Some("not.a.token"), Some(json!({"name": "X"}))).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.body["error"], "token_invalid");

    let short_lived = TokenIssuer::new(
        TEST_SECRET,
        TokenConfig {
            ttl: Duration::from_secs(1),
            ..TokenConfig::default()
        },
    )
    .unwrap();
    let principal = service.get_user(&id).map(|u| admin_principal(&u)).unwrap();
    let token = short_lived.issue(&principal).unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    let expired = send(&service, Method::DELETE, &path, Some(token.token()), None).await;
    assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
    assert_eq!(expired.body["error"], "token_expired");
}

#[tokio::test]
async fn user_reads_and_admin_mutations() {
    let service = test_service();

    let empty = send(&service, Method::GET, "/users", None, None).await;
    assert_eq!(empty.status, StatusCode::NOT_FOUND);
    assert_eq!(empty.body["message"], "No users found");

    let (_, id) = register(&service, "a@x.com").await;
    let admin = admin_token(&service);

    let listed = send(&service, Method::GET, "/users", None, None).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body.as_array().unwrap().len(), 2);

    let path = format!("/users/{}", id);
    let fetched = send(&service, Method::GET, &path, None, None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["email"], "a@x.com");

    let promoted = send(&service, Method::PATCH, &path, Some(&admin), Some(json!({"role": "ADMIN"}))).await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["role"], "ADMIN");

    let deleted = send(&service, Method::DELETE, &path, Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["id"], id.as_str());

    let gone = send(&service, Method::GET, &path, None, None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let absent = send(&service, Method::DELETE, &path, Some(&admin), None).await;
    assert_eq!(absent.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_patch_may_carry_role() {
    let service = test_service();
    let (token, id) = register(&service, "a@x.com").await;
    let path = format!("/users/{}", id);

    let unchanged = send(
        &service,
        Method::PATCH,
        &path,
        Some(&token),
        Some(json!({"name": "B", "role": "USER"})),
    )
    .await;
    assert_eq!(unchanged.status, StatusCode::OK);
    assert_eq!(unchanged.body["name"], "B");
    assert_eq!(unchanged.body["role"], "USER");

    let promoted = send(&service, Method::PATCH, &path, Some(&token), Some(json!({"role": "ADMIN"}))).await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["role"], "ADMIN");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let service = test_service();

    let padding = "x".repeat(accountd_server::handlers::MAX_BODY_BYTES + 1);
    let body = json!({"email": "a@x.com", "password": "secret1", "name": padding}).to_string();
    let response = send_raw(&service, Method::POST, "/auth/register", None, body).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "validation_error");
    assert!(service.list_users().is_err());
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let service = test_service();

    let response = send(&service, Method::GET, "/nope", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "not_found");

    let wrong_method = send(&service, Method::PUT, "/users", None, None).await;
    assert_eq!(wrong_method.status, StatusCode::NOT_FOUND);

    let health = send(&service, Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");
}

#[tokio::test]
async fn store_failures_are_internal_errors() {
    let service = service_with_store(Arc::new(FailingCredentialStore));

    let response = send(&service, Method::GET, "/users", None, None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "store_error");
    assert!(!response.body["message"].as_str().unwrap().contains("injected"));
}

#[tokio::test]
async fn serves_http1_over_tcp() {
    let (engine, _temp) = StorageEngine::temp().unwrap();
    let service = service_with_store(Arc::new(engine.credential_store().unwrap()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(AccountServer::new(service).serve(listener, async move {
        let _ = stop_rx.await;
    }));

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await.unwrap();
    tokio::spawn(conn);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/auth/register")
        .header(hyper::header::HOST, addr.to_string())
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(
            json!({"email": "tcp@x.com", "password": "secret1", "name": "T"}).to_string(),
        )))
        .unwrap();

    let response = sender.send_request(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["user"]["email"], "tcp@x.com");

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

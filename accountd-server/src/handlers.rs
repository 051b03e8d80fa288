//! HTTP request handlers for accountd

use accountd_core::{AccountError, AccountService, Credentials, NewAccount, Principal, PublicUser, Result, UserPatch};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, SERVER};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Instant;
use tracing::{debug, error, info};

pub type ResponseBody = Full<Bytes>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest request body accepted, in bytes
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const SERVER_NAME: &str = concat!("accountd/", env!("CARGO_PKG_VERSION"));

/// Session token as returned by the auth routes
#[derive(Debug, Serialize)]
struct TokenResponse<'a> {
    access_token: &'a str,
    token_type: &'static str,
    expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a PublicUser>,
}

/// Main request handler.
///
/// Never fails: every error is rendered as a JSON error body.
pub async fn handle_request<B>(req: Request<B>, service: AccountService) -> std::result::Result<Response<ResponseBody>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = match route(req, service, &method, &path).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_fault() {
                error!("{} {} failed: {}", method, path, e);
            } else {
                debug!("{} {} rejected: {}", method, path, e);
            }
            error_response(&e)
        }
    };

    info!(
        "{} {} -> {} ({}ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    Ok(response)
}

async fn route<B>(req: Request<B>, service: AccountService, method: &Method, path: &str) -> Result<Response<ResponseBody>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) => handle_health(),
        (&Method::POST, ["auth", "login"]) => handle_login(req, service).await,
        (&Method::POST, ["auth", "register"]) => handle_register(req, service).await,
        (&Method::POST, ["users"]) => handle_create_user(req, service).await,
        (&Method::GET, ["users"]) => handle_list_users(service).await,
        (&Method::GET, ["users", id]) => handle_get_user(service, id).await,
        (&Method::PATCH, ["users", id]) => handle_update_user(req, service, id).await,
        (&Method::DELETE, ["users", id]) => handle_delete_user(req, service, id).await,
        _ => Err(AccountError::NotFound(format!("No route for {} {}", method, path))),
    }
}

fn handle_health() -> Result<Response<ResponseBody>> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "service": "accountd",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

async fn handle_login<B>(req: Request<B>, service: AccountService) -> Result<Response<ResponseBody>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let credentials: Credentials = read_json(req.into_body()).await?;
    let session = blocking(move || service.login(credentials)).await?;

    json_response(
        StatusCode::CREATED,
        &TokenResponse {
            access_token: session.token.token(),
            token_type: "Bearer",
            expires_in: session.token.expires_in(),
            user: None,
        },
    )
}

async fn handle_register<B>(req: Request<B>, service: AccountService) -> Result<Response<ResponseBody>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let account: NewAccount = read_json(req.into_body()).await?;
    let registration = blocking(move || service.register(account)).await?;

    json_response(
        StatusCode::CREATED,
        &TokenResponse {
            access_token: registration.session.token.token(),
            token_type: "Bearer",
            expires_in: registration.session.token.expires_in(),
            user: Some(&registration.user),
        },
    )
}

async fn handle_create_user<B>(req: Request<B>, service: AccountService) -> Result<Response<ResponseBody>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let account: NewAccount = read_json(req.into_body()).await?;
    let user = blocking(move || service.create_user(account)).await?;
    json_response(StatusCode::CREATED, &user)
}

async fn handle_list_users(service: AccountService) -> Result<Response<ResponseBody>> {
    let users = blocking(move || service.list_users()).await?;
    json_response(StatusCode::OK, &users)
}

async fn handle_get_user(service: AccountService, id: &str) -> Result<Response<ResponseBody>> {
    let id = id.to_owned();
    let user = blocking(move || service.get_user(&id)).await?;
    json_response(StatusCode::OK, &user)
}

async fn handle_update_user<B>(req: Request<B>, service: AccountService, id: &str) -> Result<Response<ResponseBody>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let principal = authenticate(&service, &parts.headers)?;
    let patch: UserPatch = read_json(body).await?;

    let id = id.to_owned();
    let user = blocking(move || service.update_user(&principal, &id, patch)).await?;
    json_response(StatusCode::OK, &user)
}

async fn handle_delete_user<B>(req: Request<B>, service: AccountService, id: &str) -> Result<Response<ResponseBody>> {
    let principal = authenticate(&service, req.headers())?;

    let id = id.to_owned();
    let user = blocking(move || service.delete_user(&principal, &id)).await?;
    json_response(StatusCode::OK, &user)
}

/// Resolve the bearer token on a request into its principal
fn authenticate(service: &AccountService, headers: &HeaderMap) -> Result<Principal> {
    let token = bearer_token(headers)?;
    service.authenticate_token(token)
}

/// Extract the token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AccountError::TokenInvalid)?
        .to_str()
        .map_err(|_| AccountError::TokenInvalid)?;

    match value.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AccountError::TokenInvalid),
    }
}

async fn read_json<B, T>(body: B) -> Result<T>
where
    B: Body,
    B::Error: Into<BoxError>,
    T: DeserializeOwned,
{
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                AccountError::Validation(format!("request body exceeds {} bytes", MAX_BODY_BYTES))
            } else {
                AccountError::Validation(format!("failed to read request body: {}", e))
            }
        })?
        .to_bytes();

    serde_json::from_slice(&bytes).map_err(|e| AccountError::Validation(format!("malformed JSON body: {}", e)))
}

/// Run a service call on the blocking pool; Argon2 and fjall calls are synchronous
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AccountError::Internal(format!("blocking task failed: {}", e)))?
}

/// HTTP status for each error kind
pub fn status_for(err: &AccountError) -> StatusCode {
    match err {
        AccountError::Validation(_) => StatusCode::BAD_REQUEST,
        AccountError::InvalidCredentials | AccountError::TokenInvalid | AccountError::TokenExpired => {
            StatusCode::UNAUTHORIZED
        }
        AccountError::Forbidden => StatusCode::FORBIDDEN,
        AccountError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountError::EmailTaken => StatusCode::CONFLICT,
        AccountError::Store(_) | AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &AccountError) -> Response<ResponseBody> {
    // Fault details stay in the log
    let message = if err.is_fault() {
        "Internal server error".to_string()
    } else {
        err.to_string()
    };

    let body = json!({ "error": err.code(), "message": message }).to_string();
    build_response(status_for(err), Bytes::from(body))
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Response<ResponseBody>> {
    let body = serde_json::to_vec(value).map_err(|e| AccountError::Internal(format!("response encoding: {}", e)))?;
    Ok(build_response(status, Bytes::from(body)))
}

fn build_response(status: StatusCode, body: Bytes) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

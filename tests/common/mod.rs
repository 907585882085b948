#![allow(dead_code)]
//! In-process stand-in for the auth backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use hzn_courier_lib::{config::Config, storage::MemoryStorage, AppState};

pub const TOKEN: &str = "tok-1234567890-abcdef";
pub const PASSWORD: &str = "secret1";
pub const CODE: &str = "1234";
pub const UNVERIFIED: &str = "unverified@example.com";
pub const TAKEN: &str = "taken@example.com";
pub const SLOW: &str = "slow@example.com";

#[derive(Clone, Default)]
pub struct Backend {
    hits: Arc<AtomicUsize>,
    fail_uploads: bool,
}

impl Backend {
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn user_json(email: &str) -> Value {
    json!({
        "id": 7,
        "email": email,
        "first_name": "Ada",
        "last_name": "Obi",
        "phone": null,
        "country": null,
        "avatar_url": "/uploads/avatars/7.jpg",
        "is_verified": true,
        "is_sender": false,
        "auth_provider": "email",
        "created_at": "2025-03-01T10:00:00.123456"
    })
}

fn token_response(email: &str) -> Response {
    Json(json!({
        "access_token": TOKEN,
        "token_type": "bearer",
        "user": user_json(email),
    }))
    .into_response()
}

fn otp_response(email: &str, message: &str) -> Response {
    Json(json!({ "message": message, "email": email, "expires_in_minutes": 10 })).into_response()
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn field(body: &Value, name: &str) -> String {
    body.get(name).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TOKEN}"))
        .unwrap_or(false)
}

async fn register(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit();
    let email = field(&body, "email");
    if email == TAKEN {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    otp_response(&email, "Registration successful. Please check your email for verification code.")
}

async fn login(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit();
    let email = field(&body, "email");
    if email == SLOW {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    if email == UNVERIFIED {
        return detail(
            StatusCode::FORBIDDEN,
            "Email not verified. A new verification code has been sent.",
        );
    }
    if field(&body, "password") != PASSWORD {
        return detail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }
    token_response(&email)
}

async fn verify_email(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit();
    if field(&body, "code") != CODE {
        return detail(StatusCode::BAD_REQUEST, "Invalid or expired verification code");
    }
    token_response(&field(&body, "email"))
}

async fn resend_otp(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit();
    let message = match field(&body, "otp_type").as_str() {
        "password_reset" => "Password reset code sent",
        _ => "Verification code sent",
    };
    otp_response(&field(&body, "email"), message)
}

async fn forgot_password(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit();
    otp_response(&field(&body, "email"), "Password reset code sent to your email")
}

async fn reset_password(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit();
    if field(&body, "code") != CODE || field(&body, "new_password").len() < 6 {
        return detail(StatusCode::BAD_REQUEST, "Invalid or expired reset code");
    }
    Json(json!({ "message": "Password reset successfully", "success": true })).into_response()
}

async fn google(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit();
    if field(&body, "id_token") != "google-ok" {
        return detail(StatusCode::UNAUTHORIZED, "Invalid Google token");
    }
    token_response("ada@gmail.com")
}

async fn me(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.hit();
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    let mut user = user_json("ada@example.com");
    user["phone"] = json!("+234 8012345678");
    Json(user).into_response()
}

async fn update_profile(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.hit();
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    let mut user = user_json("ada@example.com");
    for key in ["first_name", "last_name", "phone", "country"] {
        if let Some(value) = body.get(key) {
            user[key] = value.clone();
        }
    }
    Json(user).into_response()
}

async fn upload_avatar(
    State(backend): State<Backend>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    backend.hit();
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    if backend.fail_uploads {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);
    let body = String::from_utf8_lossy(&body);
    if !multipart || !body.contains("name=\"file\"") {
        return detail(StatusCode::BAD_REQUEST, "No file uploaded");
    }
    let mut user = user_json("ada@example.com");
    user["avatar_url"] = json!("/uploads/avatars/7_new.png");
    Json(user).into_response()
}

pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/google", post(google))
        .route("/auth/me", get(me))
        .route("/auth/profile", put(update_profile))
        .route("/auth/upload-avatar", post(upload_avatar))
        .with_state(backend)
}

/// Serve the backend on an ephemeral port and return its origin
pub async fn spawn(backend: Backend) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn config_for(origin: &str) -> Config {
    Config::default().with_api_url(origin).unwrap()
}

/// App state against a fresh backend, with in-memory storage
pub async fn app() -> (AppState, Backend) {
    app_with(Backend::default()).await
}

pub async fn app_with(backend: Backend) -> (AppState, Backend) {
    let origin = spawn(backend.clone()).await;
    let state = AppState::new(config_for(&origin), Box::new(MemoryStorage::new())).unwrap();
    (state, backend)
}

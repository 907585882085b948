//! API Module
//!
//! Handles HTTP communication with the HZN Courier auth/profile API.
//! Every call is a single request; nothing is retried.

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, error, debug};

use crate::auth::{token_hint, UserProfile};
use crate::config::Config;

/// API client for the HZN Courier backend
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network {
                fallback: "Could not start HTTP client",
                detail: e.to_string(),
            })?;

        Ok(Self {
            base_url: config.auth_url(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a new account; the server answers by emailing a code
    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<OtpResponse, ApiError> {
        info!("Register attempt for {}", request.email);
        let request = self.client.post(self.url("/register")).json(request);
        send(request, "Registration failed").await
    }

    /// Log in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        info!("Login attempt for {}", email);
        let request = self
            .client
            .post(self.url("/login"))
            .json(&LoginRequest { email, password });
        send(request, "Login failed").await
    }

    /// Confirm an email address with the emailed code
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<TokenResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/verify-email"))
            .json(&CodeRequest { email, code });
        send(request, "Verification failed").await
    }

    /// Ask for a fresh code
    pub async fn resend_otp(&self, email: &str, purpose: OtpPurpose) -> Result<OtpResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/resend-otp"))
            .json(&ResendRequest { email, otp_type: purpose });
        send(request, "Failed to resend Code").await
    }

    /// Start a password reset
    pub async fn forgot_password(&self, email: &str) -> Result<OtpResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/forgot-password"))
            .json(&EmailRequest { email });
        send(request, "Request failed").await
    }

    /// Finish a password reset with the emailed code
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/reset-password"))
            .json(&ResetRequest { email, code, new_password });
        send(request, "Reset failed").await
    }

    /// Exchange a Google ID token for a session
    pub async fn google_auth(&self, id_token: &str) -> Result<TokenResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/google"))
            .json(&GoogleRequest { id_token });
        send(request, "Google Auth failed").await
    }

    /// Fetch the current user's profile
    pub async fn me(&self, token: &str) -> Result<UserProfile, ApiError> {
        let request = self.client.get(self.url("/me")).bearer_auth(token);
        send(request, "Failed to fetch profile").await
    }

    /// Update profile fields; absent fields are left alone
    pub async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ApiError> {
        let request = self
            .client
            .put(self.url("/profile"))
            .bearer_auth(token)
            .json(update);
        send(request, "Failed to update profile").await
    }

    /// Upload a new avatar image as multipart field `file`
    pub async fn upload_avatar(
        &self,
        token: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UserProfile, ApiError> {
        let mime = image_mime(file_name).ok_or_else(|| ApiError::Rejected {
            kind: ErrorKind::Validation,
            message: "Invalid file type. Allowed types: jpg, png, gif, webp".into(),
        })?;

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        debug!("Uploading avatar {} with token {}...", file_name, token_hint(token));

        let request = self
            .client
            .post(self.url("/upload-avatar"))
            .bearer_auth(token)
            .multipart(Form::new().part("file", part));
        send(request, "Failed to upload avatar").await
    }
}

async fn send<T>(request: reqwest::RequestBuilder, fallback: &'static str) -> Result<T, ApiError>
where
    T: for<'de> Deserialize<'de>,
{
    let response = request.send().await.map_err(|e| {
        error!("{}: {}", fallback, e);
        ApiError::Network {
            fallback,
            detail: e.to_string(),
        }
    })?;

    if !response.status().is_success() {
        return Err(rejection(response, fallback).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Parse(e.to_string()))
}

async fn rejection(response: Response, fallback: &'static str) -> ApiError {
    let status = response.status();
    let detail = response
        .json::<ErrorResponse>()
        .await
        .ok()
        .and_then(|body| body.detail.message());

    debug!("Request rejected with {}: {:?}", status, detail);

    match detail {
        Some(message) => ApiError::Rejected {
            kind: ErrorKind::classify(status, &message),
            message,
        },
        None => ApiError::Rejected {
            kind: ErrorKind::classify(status, ""),
            message: fallback.to_string(),
        },
    }
}

/// MIME type for the image formats the server accepts
pub fn image_mime(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CodeRequest<'a> {
    email: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    email: &'a str,
    otp_type: OtpPurpose,
}

#[derive(Serialize)]
struct ResetRequest<'a> {
    email: &'a str,
    code: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct GoogleRequest<'a> {
    id_token: &'a str,
}

/// What a one-time code is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
}

/// Fields of a profile update; `None` fields are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub user: UserProfile,
}

fn bearer() -> String {
    "bearer".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpResponse {
    pub message: String,
    pub email: String,
    #[serde(default = "default_expiry")]
    pub expires_in_minutes: u32,
}

fn default_expiry() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: ErrorDetail,
}

/// `detail` is a string, or a list of field errors for 422s
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldDetail>),
}

#[derive(Deserialize)]
struct FieldDetail {
    msg: String,
}

impl ErrorDetail {
    fn message(self) -> Option<String> {
        let message = match self {
            ErrorDetail::Message(message) => message,
            ErrorDetail::Fields(fields) => fields
                .into_iter()
                .map(|f| f.msg)
                .collect::<Vec<_>>()
                .join("; "),
        };
        (!message.trim().is_empty()).then_some(message)
    }
}

/// Category of a failed call, for deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    Authentication,
    EmailNotVerified,
    Otp,
    NotFound,
    RateLimit,
    Server,
    Network,
    Storage,
}

impl ErrorKind {
    fn classify(status: StatusCode, message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        match status {
            StatusCode::FORBIDDEN if message.contains("not verified") => ErrorKind::EmailNotVerified,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Authentication,
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimit,
            StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Validation,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            StatusCode::BAD_REQUEST if message.contains("already") => ErrorKind::Conflict,
            StatusCode::BAD_REQUEST if message.contains("code") => ErrorKind::Otp,
            StatusCode::BAD_REQUEST => ErrorKind::Validation,
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            _ => ErrorKind::Server,
        }
    }
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport failure; shows the endpoint's generic message
    #[error("{fallback}")]
    Network { fallback: &'static str, detail: String },

    /// The server, or a client-side check standing in for it, refused the call
    #[error("{message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Rejected { kind, .. } => *kind,
            ApiError::Parse(_) => ErrorKind::Server,
            ApiError::NotAuthenticated => ErrorKind::Authentication,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(image_mime("me.JPG"), Some("image/jpeg"));
        assert_eq!(image_mime("a.b.webp"), Some("image/webp"));
        assert_eq!(image_mime("notes.txt"), None);
        assert_eq!(image_mime("noextension"), None);
    }

    #[test]
    fn classification_follows_status_and_detail() {
        assert_eq!(
            ErrorKind::classify(StatusCode::FORBIDDEN, "Email not verified. A new verification code has been sent."),
            ErrorKind::EmailNotVerified
        );
        assert_eq!(
            ErrorKind::classify(StatusCode::UNAUTHORIZED, "Invalid email or password"),
            ErrorKind::Authentication
        );
        assert_eq!(
            ErrorKind::classify(StatusCode::BAD_REQUEST, "Email already registered"),
            ErrorKind::Conflict
        );
        assert_eq!(
            ErrorKind::classify(StatusCode::BAD_REQUEST, "Invalid or expired verification code"),
            ErrorKind::Otp
        );
        assert_eq!(ErrorKind::classify(StatusCode::BAD_GATEWAY, ""), ErrorKind::Server);
    }

    #[test]
    fn field_errors_are_joined() {
        let body: ErrorResponse = serde_json::from_str(
            r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email address","type":"value_error"},
                          {"loc":["body","password"],"msg":"too short","type":"value_error"}]}"#,
        )
        .unwrap();
        assert_eq!(
            body.detail.message().as_deref(),
            Some("value is not a valid email address; too short")
        );
    }

    #[test]
    fn message_response_defaults_to_success() {
        let response: MessageResponse =
            serde_json::from_str(r#"{"message":"Password reset successfully"}"#).unwrap();
        assert!(response.success);

        let failed: MessageResponse =
            serde_json::from_str(r#"{"message":"nope","success":false}"#).unwrap();
        assert!(!failed.success);
    }

    #[test]
    fn network_error_shows_fallback() {
        let err = ApiError::Network {
            fallback: "Login failed",
            detail: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "Login failed");
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn profile_update_skips_absent_fields() {
        let update = ProfileUpdate {
            first_name: Some("Ada".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"first_name":"Ada"}"#);
    }
}

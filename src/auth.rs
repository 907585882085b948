//! Authentication Module
//!
//! Handles the bearer token, the signed-in user's profile and session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;

/// User profile as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub is_sender: bool,
    pub auth_provider: String,
    #[serde(deserialize_with = "server_time")]
    pub created_at: DateTime<Utc>,
}

/// Backend timestamps are RFC 3339 or naive UTC
fn server_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
        })
        .map_err(serde::de::Error::custom)
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Initials for the avatar placeholder
    pub fn initials(&self) -> String {
        [&self.first_name, &self.last_name]
            .iter()
            .filter_map(|name| name.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// Same profile with its avatar URL made absolute
    pub fn with_absolute_avatar(mut self, config: &Config) -> Self {
        self.avatar_url = self
            .avatar_url
            .filter(|url| !url.is_empty())
            .map(|url| config.media_url(&url));
        self
    }
}

/// An established session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl Session {
    /// First characters of the token, for logs
    pub fn token_hint(&self) -> &str {
        token_hint(&self.token)
    }
}

pub(crate) fn token_hint(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(10)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

/// Holds the session for the running app
pub struct SessionManager {
    session: Option<Session>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Set the current session
    pub fn set_session(&mut self, session: Session) {
        info!("Session set for user: {}", session.user.id);
        self.session = Some(session);
    }

    /// Get the current session
    pub fn get_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Get the bearer token if authenticated
    pub fn get_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    /// Current user profile
    pub fn user(&self) -> Option<&UserProfile> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// Replace the profile of the current session
    pub fn update_user(&mut self, user: UserProfile) {
        if let Some(session) = self.session.as_mut() {
            session.user = user;
        }
    }

    /// Check if currently authenticated
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Clear the current session
    pub fn clear_session(&mut self) {
        info!("Session cleared");
        self.session = None;
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

//! HZN Courier Client Library
//!
//! Client core of the delivery-robot tracking app: authentication,
//! session persistence, profile management and delivery tracking.

pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod countdown;
pub mod forms;
pub mod logging;
pub mod storage;
pub mod timeline;

use std::sync::Mutex;
use api::{ApiClient, ApiError};
use auth::SessionManager;
use commands::InFlight;
use config::Config;
use countdown::Countdown;
use storage::CredentialStore;

/// Application state handed to every command
pub struct AppState {
    pub config: Config,
    pub session: Mutex<SessionManager>,
    pub storage: Box<dyn CredentialStore>,
    pub api: ApiClient,
    pub in_flight: InFlight,
    pub resend: Mutex<Option<Countdown>>,
}

impl AppState {
    pub fn new(config: Config, storage: Box<dyn CredentialStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;
        Ok(Self {
            config,
            session: Mutex::new(SessionManager::new()),
            storage,
            api,
            in_flight: InFlight::default(),
            resend: Mutex::new(None),
        })
    }
}

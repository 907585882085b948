//! Commands Module
//!
//! Operations behind each screen. Every command takes the app state
//! explicitly and answers with an [`Outcome`] the screen matches on.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use serde::Serialize;
use tracing::{info, warn, error, debug};

use crate::api::{ApiError, ErrorKind, MessageResponse, OtpPurpose, OtpResponse, TokenResponse};
use crate::auth::{Session, UserProfile};
use crate::countdown::{Countdown, INITIAL_RESEND_SECS, RESEND_SECS};
use crate::forms::{
    FieldErrors, ForgotPasswordForm, LoginForm, OtpForm, ProfileForm, ResetPasswordForm,
    SenderAccessForm, SenderAccessRequest, SignUpForm,
};
use crate::storage::{CredentialStore, StorageError};
use crate::timeline::{stages, BadgeStyle, Delivery, Stage, TrackingEvent};
use crate::AppState;

/// Result of a screen operation
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The operation succeeded
    Done(T),
    /// The form did not validate; nothing was sent
    Invalid(FieldErrors),
    /// The account exists but its email is unconfirmed
    NeedsVerification { email: String, message: String },
    /// The same form already has a request in flight
    Busy,
    /// A code was requested too recently
    CoolingDown { seconds: u32 },
    /// The request failed; local state is as it was before
    Failed { kind: ErrorKind, message: String },
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    fn from_api(err: ApiError) -> Self {
        error!("Request failed: {:?}", err);
        Outcome::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn from_storage(err: StorageError) -> Self {
        error!("Failed to persist session: {}", err);
        Outcome::Failed {
            kind: ErrorKind::Storage,
            message: "Could not save your session on this device".into(),
        }
    }

    fn not_authenticated() -> Self {
        Self::from_api(ApiError::NotAuthenticated)
    }
}

/// Forms that submit to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    SignUp,
    Login,
    VerifyEmail,
    ResendCode,
    ForgotPassword,
    ResetPassword,
    GoogleSignIn,
    Profile,
    Avatar,
}

/// Tracks which forms are waiting on a response
#[derive(Default)]
pub struct InFlight {
    pending: Mutex<HashSet<FormKind>>,
}

impl InFlight {
    /// Mark a form as submitting; `None` if it already is
    pub fn try_begin(&self, form: FormKind) -> Option<SubmitGuard<'_>> {
        if lock(&self.pending).insert(form) {
            Some(SubmitGuard { owner: self, form })
        } else {
            None
        }
    }

    pub fn is_pending(&self, form: FormKind) -> bool {
        lock(&self.pending).contains(&form)
    }
}

/// Releases the form when the request completes
pub struct SubmitGuard<'a> {
    owner: &'a InFlight,
    form: FormKind,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        lock(&self.owner.pending).remove(&self.form);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

macro_rules! submit_guard {
    ($state:expr, $form:expr) => {
        match $state.in_flight.try_begin($form) {
            Some(guard) => guard,
            None => {
                debug!("{:?} already submitting", $form);
                return Outcome::Busy;
            }
        }
    };
}

fn current_token(state: &AppState) -> Option<String> {
    lock(&state.session).get_token().map(str::to_string)
}

fn start_cooldown(state: &AppState, seconds: u32) {
    *lock(&state.resend) = Some(Countdown::start(seconds));
}

/// Seconds until another code may be requested
pub fn resend_cooldown(state: &AppState) -> u32 {
    lock(&state.resend).as_ref().map(Countdown::remaining).unwrap_or(0)
}

/// Persist token then profile, then make the session current.
fn establish_session(state: &AppState, response: TokenResponse) -> Outcome<UserProfile> {
    let user = response.user.with_absolute_avatar(&state.config);
    let previous_token = state.storage.get_token().unwrap_or_else(|e| {
        warn!("Could not read stored token: {}", e);
        None
    });

    if let Err(e) = state.storage.set_token(&response.access_token) {
        return Outcome::from_storage(e);
    }
    if let Err(e) = state.storage.set_user_profile(&user) {
        // The stored profile is unchanged; only the token needs putting back
        restore_token(state, previous_token);
        return Outcome::from_storage(e);
    }

    lock(&state.session).set_session(Session {
        token: response.access_token,
        user: user.clone(),
    });
    *lock(&state.resend) = None;

    Outcome::Done(user)
}

/// Undo a token write. If that fails, storage and the in-memory session are
/// both cleared so they agree.
fn restore_token(state: &AppState, previous: Option<String>) {
    let restored = match previous.as_deref() {
        Some(token) => state.storage.set_token(token),
        None => state.storage.clear_session(),
    };

    if let Err(e) = restored {
        error!("Failed to restore previous session: {}", e);
        if let Err(e) = state.storage.clear_session() {
            error!("Failed to clear stored session: {}", e);
        }
        lock(&state.session).clear_session();
    }
}

/// Persist a refreshed profile and show it
fn store_profile(state: &AppState, user: UserProfile) -> Outcome<UserProfile> {
    let user = user.with_absolute_avatar(&state.config);
    if let Err(e) = state.storage.set_user_profile(&user) {
        return Outcome::from_storage(e);
    }
    lock(&state.session).update_user(user.clone());
    Outcome::Done(user)
}

/// Load the session saved by a previous run
pub fn restore_session(state: &AppState) -> Option<Session> {
    debug!("Getting stored session");

    let token = match state.storage.get_token() {
        Ok(Some(token)) => token,
        Ok(None) => {
            debug!("No stored session found");
            return None;
        }
        Err(e) => {
            warn!("Could not read stored token: {}", e);
            return None;
        }
    };

    let user = match state.storage.get_user_profile() {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Stored token has no profile, discarding");
            if let Err(e) = state.storage.clear_session() {
                warn!("Could not discard stored token: {}", e);
            }
            return None;
        }
        Err(e) => {
            warn!("Could not read stored profile: {}", e);
            return None;
        }
    };

    let session = Session { token, user };
    lock(&state.session).set_session(session.clone());
    Some(session)
}

/// Create an account; a verification code is emailed
pub async fn sign_up(state: &AppState, form: &SignUpForm) -> Outcome<OtpResponse> {
    if let Err(errors) = form.validate() {
        return Outcome::Invalid(errors);
    }
    let _guard = submit_guard!(state, FormKind::SignUp);

    match state.api.register(&form.request()).await {
        Ok(response) => {
            start_cooldown(state, INITIAL_RESEND_SECS);
            Outcome::Done(response)
        }
        Err(e) => Outcome::from_api(e),
    }
}

/// Log in; an unverified account is sent to email verification
pub async fn login(state: &AppState, form: &LoginForm) -> Outcome<UserProfile> {
    if let Err(errors) = form.validate() {
        return Outcome::Invalid(errors);
    }
    let _guard = submit_guard!(state, FormKind::Login);

    let email = form.email.trim();
    match state.api.login(email, &form.password).await {
        Ok(response) => establish_session(state, response),
        Err(e) if e.kind() == ErrorKind::EmailNotVerified => {
            info!("Login for unverified account {}", email);
            start_cooldown(state, INITIAL_RESEND_SECS);
            Outcome::NeedsVerification {
                email: email.to_string(),
                message: "Email not verified. Please check your inbox for a new code.".into(),
            }
        }
        Err(e) => Outcome::from_api(e),
    }
}

/// Confirm the email address and sign in
pub async fn verify_email(state: &AppState, form: &OtpForm) -> Outcome<UserProfile> {
    if let Err(errors) = form.validate() {
        return Outcome::Invalid(errors);
    }
    let _guard = submit_guard!(state, FormKind::VerifyEmail);

    match state.api.verify_email(form.email.trim(), form.code.trim()).await {
        Ok(response) => establish_session(state, response),
        Err(e) => Outcome::from_api(e),
    }
}

/// Request another code once the cooldown has run out
pub async fn resend_code(state: &AppState, email: &str, purpose: OtpPurpose) -> Outcome<OtpResponse> {
    let seconds = resend_cooldown(state);
    if seconds > 0 {
        return Outcome::CoolingDown { seconds };
    }
    let _guard = submit_guard!(state, FormKind::ResendCode);

    match state.api.resend_otp(email.trim(), purpose).await {
        Ok(response) => {
            start_cooldown(state, RESEND_SECS);
            Outcome::Done(response)
        }
        Err(e) => Outcome::from_api(e),
    }
}

/// Email a password reset code
pub async fn forgot_password(state: &AppState, form: &ForgotPasswordForm) -> Outcome<OtpResponse> {
    if let Err(errors) = form.validate() {
        return Outcome::Invalid(errors);
    }
    let _guard = submit_guard!(state, FormKind::ForgotPassword);

    match state.api.forgot_password(form.email.trim()).await {
        Ok(response) => {
            start_cooldown(state, INITIAL_RESEND_SECS);
            Outcome::Done(response)
        }
        Err(e) => Outcome::from_api(e),
    }
}

/// Set a new password with the emailed code
pub async fn reset_password(state: &AppState, form: &ResetPasswordForm) -> Outcome<MessageResponse> {
    if let Err(errors) = form.validate() {
        return Outcome::Invalid(errors);
    }
    let _guard = submit_guard!(state, FormKind::ResetPassword);

    match state
        .api
        .reset_password(form.email.trim(), form.code.trim(), &form.new_password)
        .await
    {
        Ok(response) => Outcome::Done(response),
        Err(e) => Outcome::from_api(e),
    }
}

/// Sign in with a Google ID token
pub async fn google_sign_in(state: &AppState, id_token: &str) -> Outcome<UserProfile> {
    if id_token.trim().is_empty() {
        let mut errors = FieldErrors::new();
        errors.add("id_token", "Google did not return a token");
        return Outcome::Invalid(errors);
    }
    let _guard = submit_guard!(state, FormKind::GoogleSignIn);

    match state.api.google_auth(id_token.trim()).await {
        Ok(response) => establish_session(state, response),
        Err(e) => Outcome::from_api(e),
    }
}

/// Re-fetch the profile from the server
pub async fn refresh_profile(state: &AppState) -> Outcome<UserProfile> {
    let Some(token) = current_token(state) else {
        return Outcome::not_authenticated();
    };

    match state.api.me(&token).await {
        Ok(user) => store_profile(state, user),
        Err(e) => Outcome::from_api(e),
    }
}

/// Pre-filled edit form for the current user
pub fn profile_form(state: &AppState) -> Option<ProfileForm> {
    let session = lock(&state.session);
    let user = session.user()?;

    let mut form = ProfileForm {
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        ..ProfileForm::default()
    };
    if let Some(phone) = user.phone.as_deref() {
        match phone.split_once(' ') {
            Some((code, number)) if code.starts_with('+') => {
                form.country_code = code.to_string();
                form.phone = number.to_string();
            }
            _ => form.phone = phone.to_string(),
        }
    }
    Some(form)
}

/// Save edited profile fields
pub async fn save_profile(state: &AppState, form: &ProfileForm) -> Outcome<UserProfile> {
    if let Err(errors) = form.validate() {
        return Outcome::Invalid(errors);
    }
    let Some(token) = current_token(state) else {
        return Outcome::not_authenticated();
    };
    let _guard = submit_guard!(state, FormKind::Profile);

    match state.api.update_profile(&token, &form.update()).await {
        Ok(user) => {
            info!("Profile updated");
            store_profile(state, user)
        }
        Err(e) => Outcome::from_api(e),
    }
}

/// A picked image ready for upload
#[derive(Debug, Clone)]
pub struct AvatarImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Where the picked image can be shown from before upload finishes
    pub local_uri: String,
}

/// Upload a new avatar.
///
/// The picked image is shown immediately; if the upload fails the previous
/// avatar is put back.
pub async fn upload_avatar(state: &AppState, image: AvatarImage) -> Outcome<UserProfile> {
    let Some(token) = current_token(state) else {
        return Outcome::not_authenticated();
    };
    let _guard = submit_guard!(state, FormKind::Avatar);

    let previous = {
        let mut session = lock(&state.session);
        let Some(mut user) = session.user().cloned() else {
            return Outcome::not_authenticated();
        };
        let previous = user.avatar_url.replace(image.local_uri.clone());
        session.update_user(user);
        previous
    };

    match state.api.upload_avatar(&token, &image.file_name, image.bytes).await {
        Ok(user) => {
            info!("Avatar uploaded");
            store_profile(state, user)
        }
        Err(e) => {
            let mut session = lock(&state.session);
            if let Some(mut user) = session.user().cloned() {
                user.avatar_url = previous;
                session.update_user(user);
            }
            drop(session);
            Outcome::from_api(e)
        }
    }
}

/// Validate a sender access request for the signed-in user
pub fn request_sender_access(state: &AppState, form: &SenderAccessForm) -> Outcome<SenderAccessRequest> {
    let is_sender = match lock(&state.session).user() {
        Some(user) => user.is_sender,
        None => return Outcome::not_authenticated(),
    };
    if is_sender {
        return Outcome::Failed {
            kind: ErrorKind::Conflict,
            message: "Your account already has sender access".into(),
        };
    }

    match form.validate() {
        Ok(request) => {
            info!("Sender access requested for {}", request.org_name);
            Outcome::Done(request)
        }
        Err(errors) => Outcome::Invalid(errors),
    }
}

/// Sign out and forget the stored session
pub fn logout(state: &AppState) -> Outcome<()> {
    info!("Logging out");

    if let Err(e) = state.storage.clear_session() {
        error!("Failed to delete session: {}", e);
        return Outcome::Failed {
            kind: ErrorKind::Storage,
            message: "Could not sign out on this device".into(),
        };
    }

    lock(&state.session).clear_session();
    *lock(&state.resend) = None;
    Outcome::Done(())
}

/// One row of the tracking timeline
#[derive(Debug, Clone, Serialize)]
pub struct TimelineRow {
    pub stage: Stage,
    pub event: TrackingEvent,
}

/// Everything the home screen renders
#[derive(Debug, Clone, Serialize)]
pub struct HomeView {
    pub first_name: Option<String>,
    pub delivery: Delivery,
    pub badge: BadgeStyle,
    pub timeline: Vec<TimelineRow>,
}

/// Home screen for a delivery
pub fn home(state: &AppState, delivery: Delivery) -> HomeView {
    let first_name = lock(&state.session).user().map(|u| u.first_name.clone());
    let events = delivery.timeline();
    let timeline = stages(&events)
        .map(|(stage, event)| TimelineRow {
            stage,
            event: event.clone(),
        })
        .collect();

    HomeView {
        first_name,
        badge: delivery.status.badge(),
        delivery,
        timeline,
    }
}

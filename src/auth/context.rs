//! Session facade.
//!
//! `AuthContext` is the only entry point domain code uses for anything
//! session-related. Every operation returns an [`Outcome`] rather than an
//! error, so UI code handles expected failures (wrong password, duplicate
//! email, expired session) by reading a message instead of matching error
//! types. Unexpected failures are normalized into generic messages and
//! logged here.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::models::{RegisterRequest, UserPatch, UserProfile};

use super::SessionStore;

/// Uniform result shape for facade operations. UI code checks
/// [`Outcome::is_success`] and shows [`Outcome::message`] on failure; it
/// never needs error plumbing for expected failure modes.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success { data: T },
    Failure { message: String },
}

impl<T> Outcome<T> {
    pub fn success(data: T) -> Self {
        Outcome::Success { data }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn data(self) -> Option<T> {
        match self {
            Outcome::Success { data } => Some(data),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { message } => Some(message),
        }
    }
}

pub struct AuthContext {
    api: Arc<ApiClient>,
    store: Arc<SessionStore>,
    current_user: RwLock<Option<UserProfile>>,
}

impl AuthContext {
    /// Wire a context over an existing client and store. The in-memory user
    /// starts from the durable cache.
    pub fn new(api: Arc<ApiClient>, store: Arc<SessionStore>) -> Self {
        let current_user = RwLock::new(store.user());
        Self {
            api,
            store,
            current_user,
        }
    }

    /// Standard application bootstrap: open the store under the configured
    /// storage directory, build the client, and fetch the anti-forgery token
    /// (non-fatal).
    pub async fn bootstrap(config: &Config) -> Result<Arc<Self>> {
        let store = Arc::new(SessionStore::new(config.storage_dir()?)?);
        let api = Arc::new(ApiClient::new(config.base_url(), Arc::clone(&store))?);
        api.prime_csrf().await;
        Ok(Arc::new(Self::new(api, store)))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Snapshot of the in-memory user.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.current_user.read().clone()
    }

    /// Whether a session exists that could survive an access-credential
    /// expiry. Without a refresh credential every protected call is doomed,
    /// so profile operations refuse to start.
    pub fn signed_in(&self) -> bool {
        self.store.refresh_credential().is_some()
    }

    // ===== Credential operations =====

    pub async fn login(&self, email: &str, password: &str) -> Outcome<UserProfile> {
        match self.api.login(email, password).await {
            Ok(payload) => {
                if let Err(err) = self.store.set_after_login(
                    payload.access_token,
                    payload.refresh_token,
                    payload.user.clone(),
                ) {
                    warn!(error = %err, "Failed to persist session after login");
                }
                *self.current_user.write() = Some(payload.user.clone());
                info!(user_id = payload.user.id, "Signed in");
                Outcome::success(payload.user)
            }
            Err(err) => {
                debug!(error = %err, "Login failed");
                Outcome::failure(login_message(&err))
            }
        }
    }

    /// Create an account. No session side effects; the caller signs in
    /// afterwards.
    pub async fn register(&self, request: &RegisterRequest) -> Outcome<UserProfile> {
        match self.api.register(request).await {
            Ok(user) => Outcome::success(user),
            Err(err) => {
                debug!(error = %err, "Registration failed");
                Outcome::failure(register_message(&err))
            }
        }
    }

    /// Sign out. The server is notified only when a refresh credential
    /// exists and its failure is ignored; local state is cleared either way.
    /// Safe to call with no session present.
    pub async fn logout(&self) -> Outcome<()> {
        if let Some(refresh_token) = self.store.refresh_credential() {
            if let Err(err) = self.api.logout(&refresh_token).await {
                warn!(error = %err, "Logout notification failed");
            }
        }
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "Failed to clear session storage");
        }
        *self.current_user.write() = None;
        info!("Signed out");
        Outcome::success(())
    }

    // ===== Profile operations =====

    pub async fn update_profile(&self, patch: &UserPatch) -> Outcome<UserProfile> {
        if !self.signed_in() {
            return Outcome::failure(NOT_SIGNED_IN);
        }
        match self.api.update_profile(patch).await {
            Ok(applied) => {
                if let Err(err) = self.store.merge_user(&applied) {
                    warn!(error = %err, "Failed to persist profile update");
                }
                match self.refresh_user() {
                    Some(user) => Outcome::success(user),
                    None => Outcome::failure(general_message(&ApiError::InvalidResponse(
                        "profile missing after update".to_string(),
                    ))),
                }
            }
            Err(err) => {
                debug!(error = %err, "Profile update failed");
                Outcome::failure(general_message(&err))
            }
        }
    }

    pub async fn update_password(&self, current: &str, new: &str) -> Outcome<()> {
        if !self.signed_in() {
            return Outcome::failure(NOT_SIGNED_IN);
        }
        match self.api.update_password(current, new).await {
            Ok(()) => Outcome::success(()),
            Err(err) => {
                debug!(error = %err, "Password update failed");
                Outcome::failure(password_message(&err))
            }
        }
    }

    /// Upload a new avatar and return its display URL, derived from the
    /// filename the server assigned. The merged profile change is broadcast
    /// through the store event channel.
    pub async fn upload_avatar(&self, filename: &str, bytes: Vec<u8>) -> Outcome<String> {
        if !self.signed_in() {
            return Outcome::failure(NOT_SIGNED_IN);
        }
        match self.api.upload_avatar(filename, bytes).await {
            Ok(uploaded) => {
                let url = self.api.avatar_url(&uploaded.filename);
                let patch = UserPatch {
                    avatar: Some(uploaded.filename),
                    avatar_url: Some(url.clone()),
                    ..Default::default()
                };
                if let Err(err) = self.store.merge_user(&patch) {
                    warn!(error = %err, "Failed to persist avatar update");
                }
                let _ = self.refresh_user();
                Outcome::success(url)
            }
            Err(err) => {
                debug!(error = %err, "Avatar upload failed");
                Outcome::failure(general_message(&err))
            }
        }
    }

    // ===== Sync =====

    /// Re-read the cached user into the in-memory context. Used after a
    /// session event; also handy right after operations that merged state.
    pub fn refresh_user(&self) -> Option<UserProfile> {
        let user = self.store.user();
        *self.current_user.write() = user.clone();
        user
    }

    /// Background task keeping the in-memory user in step with store events
    /// from other holders of the same store (another window, the refresh
    /// coordinator's cascade). Best effort: lagged receivers just re-read.
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let context = Arc::clone(self);
        let mut events = context.store.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!(?event, "Session event received, re-reading user cache");
                        context.refresh_user();
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session event stream lagged, re-reading user cache");
                        context.refresh_user();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

// ============================================================================
// User-facing messages
// ============================================================================

const NOT_SIGNED_IN: &str = "You need to sign in first.";

fn login_message(err: &ApiError) -> String {
    match err {
        ApiError::Unauthorized | ApiError::AccessDenied(_) => {
            "Invalid email or password.".to_string()
        }
        other => general_message(other),
    }
}

fn register_message(err: &ApiError) -> String {
    match err {
        ApiError::Conflict(_) => "An account with that email already exists.".to_string(),
        other => general_message(other),
    }
}

fn password_message(err: &ApiError) -> String {
    match err {
        ApiError::Unauthorized | ApiError::AccessDenied(_) => {
            "Current password is incorrect.".to_string()
        }
        other => general_message(other),
    }
}

fn general_message(err: &ApiError) -> String {
    match err {
        ApiError::SessionExpired(_) => "Your session has expired. Please sign in again.",
        ApiError::Network(_) => "Could not reach the server. Please try again.",
        ApiError::RateLimited => "Too many requests. Please wait a moment and try again.",
        ApiError::ServerError(_) => "The server ran into a problem. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
    .to_string()
}

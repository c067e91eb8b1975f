//! API client for the Marquee REST API.
//!
//! This module provides the `ApiClient` struct: the typed auth-surface
//! endpoints plus generic JSON verbs for domain code. Everything except the
//! credential-issuing endpoints is routed through the refresh coordinator,
//! so callers never see a recoverable 401.

use std::sync::Arc;

use anyhow::Result;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use crate::auth::SessionStore;
use crate::models::{AuthPayload, AvatarUpload, RegisterRequest, UserPatch, UserProfile};

use super::http::{HttpClient, RequestSpec};
use super::ApiError;

// ============================================================================
// Endpoint paths
// ============================================================================

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const LOGOUT_PATH: &str = "/auth/logout";
const PROFILE_PATH: &str = "/users/me";
const PASSWORD_PATH: &str = "/users/me/password";
const AVATAR_PATH: &str = "/users/me/avatar";

/// Path under which uploaded avatars are served
const AVATAR_PUBLIC_PREFIX: &str = "/uploads/avatars";

/// Form field name for the avatar upload
const AVATAR_FIELD: &str = "avatar";

/// API client for the Marquee platform.
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    /// Create a new API client bound to the given base URL and session store.
    pub fn new(base_url: impl Into<String>, store: Arc<SessionStore>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(base_url.into(), store)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Fetch the anti-forgery token once at bootstrap. Failure is logged and
    /// otherwise ignored.
    pub async fn prime_csrf(&self) {
        self.http.prime_csrf().await;
    }

    /// Display URL for an uploaded avatar filename.
    pub fn avatar_url(&self, filename: &str) -> String {
        format!("{}{}/{}", self.http.base_url(), AVATAR_PUBLIC_PREFIX, filename)
    }

    // ===== Auth surface =====
    //
    // These endpoints issue or revoke credentials. A 401 here means "invalid
    // credentials" and must reach the caller untouched, so the requests are
    // marked auth-surface and skip the refresh coordinator.

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let spec = RequestSpec::new(Method::POST, LOGIN_PATH)
            .json(&serde_json::json!({ "email": email, "password": password }))?
            .auth_surface();
        self.http.send_json(spec).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ApiError> {
        let spec = RequestSpec::new(Method::POST, REGISTER_PATH)
            .json(request)?
            .auth_surface();
        self.http.send_json(spec).await
    }

    /// Notify the server that the refresh credential should be invalidated.
    /// Local state is untouched; that is the facade's job.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let spec = RequestSpec::new(Method::POST, LOGOUT_PATH)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))?
            .auth_surface();
        self.http.send(spec).await?;
        Ok(())
    }

    // ===== Profile =====

    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.http
            .send_json(RequestSpec::new(Method::GET, PROFILE_PATH))
            .await
    }

    /// Update profile fields. The server echoes the fields it applied, which
    /// the caller merges into the cached profile.
    pub async fn update_profile(&self, patch: &UserPatch) -> Result<UserPatch, ApiError> {
        let spec = RequestSpec::new(Method::PUT, PROFILE_PATH).json(patch)?;
        self.http.send_json(spec).await
    }

    pub async fn update_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
        let spec = RequestSpec::new(Method::PUT, PASSWORD_PATH).json(&serde_json::json!({
            "currentPassword": current,
            "newPassword": new,
        }))?;
        self.http.send(spec).await?;
        Ok(())
    }

    pub async fn upload_avatar(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AvatarUpload, ApiError> {
        let spec =
            RequestSpec::new(Method::POST, AVATAR_PATH).multipart(AVATAR_FIELD, filename, bytes);
        self.http.send_json(spec).await
    }

    // ===== Generic verbs for domain code =====
    //
    // Domain screens (events, companies, tickets, promo codes) call these;
    // they carry no retry logic of their own.

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.http.send_json(RequestSpec::new(Method::GET, path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let spec = RequestSpec::new(Method::POST, path).json(body)?;
        self.http.send_json(spec).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let spec = RequestSpec::new(Method::PUT, path).json(body)?;
        self.http.send_json(spec).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let spec = RequestSpec::new(Method::PATCH, path).json(body)?;
        self.http.send_json(spec).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.http.send(RequestSpec::new(Method::DELETE, path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_url_derivation() {
        let store = Arc::new(
            crate::auth::SessionStore::new(
                tempfile::tempdir().expect("tempdir").path().to_path_buf(),
            )
            .expect("store should open"),
        );
        let client =
            ApiClient::new("https://api.marquee.events", store).expect("client should build");
        assert_eq!(
            client.avatar_url("a1b2c3.png"),
            "https://api.marquee.events/uploads/avatars/a1b2c3.png"
        );
    }
}

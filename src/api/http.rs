//! HTTP transport: request decoration, auth-failure detection, and the
//! refresh coordinator.
//!
//! Every outgoing request is decorated with the current bearer credential
//! (re-read from the session store on each attempt, never captured) and, for
//! mutating verbs, the anti-forgery token. Failed responses run through the
//! coordinator: a 401/403 on a protected endpoint triggers at most one
//! silent refresh-and-replay per originating request, and a failed refresh
//! cascades into a full logout.
//!
//! Concurrent refresh attempts are serialized behind a single gate; callers
//! that queued behind an in-flight refresh reuse its result instead of
//! issuing their own network call.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{multipart, Client, Method, Response};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::csrf::{CsrfGuard, CSRF_HEADER};
use crate::auth::SessionStore;
use crate::models::RefreshPayload;

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh endpoint, called by the coordinator only
const REFRESH_PATH: &str = "/auth/refresh";

/// Logout endpoint, used here for the best-effort call during a cascade
const LOGOUT_PATH: &str = "/auth/logout";

/// Whether a request has already been through a refresh-and-replay cycle.
/// A `Retried` request is never replayed again, whatever it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Fresh,
    Retried,
}

/// Replayable request body. Bodies are kept in buildable form (not as a
/// consumed `reqwest` body) so the replay is byte-identical to the original.
#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart {
        field: &'static str,
        filename: String,
        bytes: Vec<u8>,
    },
}

/// Description of an outgoing call, sufficient to dispatch it any number of
/// times.
#[derive(Debug, Clone)]
pub(crate) struct RequestSpec {
    method: Method,
    path: String,
    body: RequestBody,
    /// Credential-issuing endpoints (login, register) fail transparently so
    /// the UI can report invalid credentials; they are never refreshed.
    auth_surface: bool,
}

impl RequestSpec {
    pub(crate) fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            auth_surface: false,
        }
    }

    pub(crate) fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|err| ApiError::InvalidRequest(format!("Failed to encode body: {}", err)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub(crate) fn multipart(
        mut self,
        field: &'static str,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.body = RequestBody::Multipart {
            field,
            filename: filename.into(),
            bytes,
        };
        self
    }

    pub(crate) fn auth_surface(mut self) -> Self {
        self.auth_surface = true;
        self
    }
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::DELETE
}

/// Transport shared by every endpoint. Holds the connection pool, the
/// anti-forgery token, and the refresh gate.
pub(crate) struct HttpClient {
    inner: Client,
    base_url: String,
    store: Arc<SessionStore>,
    csrf: CsrfGuard,
    refresh_gate: Mutex<()>,
}

impl HttpClient {
    pub(crate) fn new(base_url: String, store: Arc<SessionStore>) -> Result<Self> {
        let inner = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            inner,
            base_url,
            store,
            csrf: CsrfGuard::new(),
            refresh_gate: Mutex::new(()),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the anti-forgery token once at bootstrap. Non-fatal.
    pub(crate) async fn prime_csrf(&self) {
        self.csrf.fetch(&self.inner, &self.base_url).await;
    }

    /// Dispatch one attempt: bearer header from a fresh store read, CSRF
    /// header on mutating verbs. Absence of a credential sends the request
    /// unauthenticated rather than failing locally.
    async fn dispatch(&self, spec: &RequestSpec) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, spec.path);
        let mut request = self.inner.request(spec.method.clone(), &url);

        if let Some(token) = self.store.access_credential() {
            request = request.bearer_auth(token);
        }
        if is_mutating(&spec.method) {
            if let Some(token) = self.csrf.token() {
                request = request.header(CSRF_HEADER, token);
            }
        }

        request = match &spec.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Multipart {
                field,
                filename,
                bytes,
            } => {
                let part = multipart::Part::bytes(bytes.clone()).file_name(filename.clone());
                request.multipart(multipart::Form::new().part(*field, part))
            }
        };

        Ok(request.send().await?)
    }

    /// Run a request through the coordinator. Success passes through; a
    /// recoverable auth failure is absorbed by one refresh-and-replay; every
    /// other failure maps onto [`ApiError`] unchanged.
    pub(crate) async fn send(&self, spec: RequestSpec) -> Result<Response, ApiError> {
        let mut attempt = Attempt::Fresh;
        loop {
            // Remember the credential this attempt used so the coordinator
            // can tell whether a concurrent caller already replaced it.
            let stale = self.store.access_credential();
            let response = self.dispatch(&spec).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            let retryable = matches!(status.as_u16(), 401 | 403)
                && attempt == Attempt::Fresh
                && !spec.auth_surface
                && self.store.refresh_credential().is_some();

            if retryable {
                attempt = Attempt::Retried;
                debug!(path = %spec.path, status = %status, "Auth failure, attempting silent refresh");
                self.refresh_access(stale).await?;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
    }

    /// Convenience wrapper decoding a JSON response body.
    pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        spec: RequestSpec,
    ) -> Result<T, ApiError> {
        let path = spec.path.clone();
        let response = self.send(spec).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, err))
        })
    }

    /// Mint a new access credential, serializing concurrent attempts.
    ///
    /// `stale` is the access credential the failing request carried. If the
    /// store holds a different one by the time the gate is acquired, another
    /// request already completed the refresh and its result is reused.
    async fn refresh_access(&self, stale: Option<String>) -> Result<(), ApiError> {
        let _gate = self.refresh_gate.lock().await;

        if self.store.access_credential() != stale {
            debug!("Access credential already refreshed by a concurrent request");
            return Ok(());
        }

        let Some(refresh_token) = self.store.refresh_credential() else {
            // A concurrent refresh failed and cascaded while we waited.
            return Err(ApiError::SessionExpired(
                "refresh credential no longer present".to_string(),
            ));
        };

        match self.call_refresh(&refresh_token).await {
            Ok(payload) => {
                if let Err(err) = self
                    .store
                    .set_after_refresh(payload.access_token, payload.refresh_token)
                {
                    // The in-memory credential is updated even when the
                    // durable write fails; requests keep working.
                    warn!(error = %err, "Failed to persist refreshed credential");
                }
                debug!("Access credential refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Credential refresh failed, cascading to logout");
                self.best_effort_logout(&refresh_token).await;
                if let Err(clear_err) = self.store.clear() {
                    warn!(error = %clear_err, "Failed to clear session storage");
                }
                Err(ApiError::SessionExpired(err.to_string()))
            }
        }
    }

    /// The dedicated auth-service refresh call. Goes straight through the
    /// inner client: the refresh endpoint itself must never re-enter the
    /// coordinator.
    async fn call_refresh(&self, refresh_token: &str) -> Result<RefreshPayload, ApiError> {
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let response = self
            .inner
            .post(&url)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", err))
        })
    }

    /// Attempt server-side invalidation of the refresh credential before the
    /// cascade clears local state. Its own errors are ignored; the client is
    /// already in a failure path.
    async fn best_effort_logout(&self, refresh_token: &str) {
        let url = format!("{}{}", self.base_url, LOGOUT_PATH);
        match self
            .inner
            .post(&url)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await
        {
            Ok(response) if !response.status().is_success() => {
                debug!(status = %response.status(), "Best-effort logout rejected");
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "Best-effort logout failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mutating() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::PATCH));
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
    }

    #[test]
    fn test_request_spec_defaults() {
        let spec = RequestSpec::new(Method::GET, "/events");
        assert!(!spec.auth_surface);
        assert!(matches!(spec.body, RequestBody::Empty));

        let spec = RequestSpec::new(Method::POST, "/auth/login").auth_surface();
        assert!(spec.auth_surface);
    }

    #[test]
    fn test_request_spec_json_body() {
        let spec = RequestSpec::new(Method::POST, "/events")
            .json(&serde_json::json!({"name": "Launch party"}))
            .expect("body should encode");
        match spec.body {
            RequestBody::Json(value) => assert_eq!(value["name"], "Launch party"),
            other => panic!("unexpected body: {:?}", other),
        }
    }
}

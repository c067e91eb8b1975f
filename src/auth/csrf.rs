//! Anti-forgery token provider.
//!
//! The token is fetched once at application bootstrap and held in memory for
//! the lifetime of the process; it is never persisted. Fetch failure is
//! non-fatal: mutating requests are then sent without the header and the
//! server decides whether to reject them. The token plays no part in the
//! refresh state machine.

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};

/// CSRF endpoint, called once per process
const CSRF_PATH: &str = "/auth/csrf";

/// Header carrying the anti-forgery token on mutating requests
pub const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Deserialize)]
struct CsrfResponse {
    token: String,
}

#[derive(Default)]
pub struct CsrfGuard {
    token: RwLock<Option<String>>,
}

impl CsrfGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the anti-forgery token. Any failure is logged and leaves the
    /// token unset; startup never blocks on this call.
    pub async fn fetch(&self, client: &reqwest::Client, base_url: &str) {
        let url = format!("{}{}", base_url, CSRF_PATH);
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<CsrfResponse>().await {
                    Ok(body) => {
                        debug!("anti-forgery token fetched");
                        *self.token.write() = Some(body.token);
                    }
                    Err(err) => {
                        warn!(error = %err, "Failed to parse anti-forgery token response");
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "Anti-forgery token request rejected");
            }
            Err(err) => {
                warn!(error = %err, "Failed to fetch anti-forgery token");
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    #[cfg(test)]
    pub(crate) fn set(&self, token: &str) {
        *self.token.write() = Some(token.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_absent() {
        let guard = CsrfGuard::new();
        assert!(guard.token().is_none());
    }

    #[test]
    fn test_token_readable_after_set() {
        let guard = CsrfGuard::new();
        guard.set("csrf-123");
        assert_eq!(guard.token().as_deref(), Some("csrf-123"));
    }
}

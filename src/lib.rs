//! Client-side session and API layer for the Marquee events platform.
//!
//! This crate owns the authenticated HTTP session: it attaches credentials to
//! outgoing requests, silently refreshes an expired access token exactly once
//! per failing request, replays the original request, and cascades into a full
//! logout when recovery is impossible. Domain screens (events, companies,
//! tickets, promo codes) are plain callers of [`AuthContext`] and the generic
//! request surface on [`ApiClient`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthContext, CsrfGuard, Outcome, Session, SessionEvent, SessionStore};
pub use config::Config;
pub use models::{AuthPayload, AvatarUpload, RefreshPayload, RegisterRequest, UserPatch, UserProfile};

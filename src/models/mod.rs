//! Data models for the Marquee API wire format.
//!
//! This module contains the serde structures exchanged with the platform:
//!
//! - `UserProfile`, `UserPatch`: the cached account profile and partial updates
//! - `AuthPayload`, `RefreshPayload`: credential-issuing endpoint responses
//! - `RegisterRequest`, `AvatarUpload`: remaining auth-surface payloads

pub mod user;

pub use user::{AuthPayload, AvatarUpload, RefreshPayload, RegisterRequest, UserPatch, UserProfile};

//! Authentication module: session state, anti-forgery token, and the facade
//! domain code talks to.
//!
//! This module provides:
//! - `SessionStore`: single owner of the persisted session fields
//! - `CsrfGuard`: one-shot anti-forgery token provider
//! - `AuthContext`: login/logout/profile operations with uniform outcomes
//! - `SessionEvent`: typed cross-instance change notifications

pub mod context;
pub mod csrf;
pub mod store;

pub use context::{AuthContext, Outcome};
pub use csrf::CsrfGuard;
pub use store::{Session, SessionEvent, SessionStore};

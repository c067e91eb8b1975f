//! HTTP layer for the Marquee REST API.
//!
//! This module provides:
//! - `ApiClient`: typed auth endpoints plus generic JSON verbs
//! - `ApiError`: the error taxonomy for failed calls
//!
//! The transport in `http` decorates every request and runs the silent
//! refresh-and-replay protocol; it is internal to this module.

pub mod client;
pub mod error;
mod http;

pub use client::ApiClient;
pub use error::ApiError;

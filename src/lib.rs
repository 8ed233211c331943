//! # Session Agent Library
//!
//! Client-side lifecycle of the session access token: resolving it from
//! memory or cookies, refreshing it exactly once for any number of concurrent
//! callers, retrying with backoff, and tearing the session down when nothing
//! works. Also serves the same-origin refresh endpoint the browser side calls.
//!
//! Modules:
//! - `cache`: JWT claim decoding, token state, in-memory token cache
//! - `sources`: browser and server refresh strategies, identity provider client
//! - `resilience`: retry schedule and the single-flight refresh coordinator
//! - `session`: cookie stores, the access token resolver, logout redirects
//! - `client`: API client with bearer attachment and 401 recovery
//! - `server`: axum refresh/logout routes
//! - `config`: YAML service configuration, defaults and validation

pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod helpers;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod session;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::token::TokenState;
pub use crate::errors::{ApiError, TokenError};
pub use crate::session::resolver::{AccessTokenResolver, ResolveOptions};

//! presigner library: SigV4 presigned upload URLs for S3-compatible storage.
//!
//! This crate provides the signing core ([`sigv4`]), object-key derivation
//! ([`object_key`]), URL assembly ([`presign`]), and the HTTP surface
//! ([`server`], [`handlers`]) that serves them. Object bytes never pass
//! through here; clients upload straight to storage with the issued URL.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod object_key;
pub mod presign;
pub mod server;
pub mod sigv4;

use crate::config::Config;

/// Shared application state passed to all handlers via `axum::extract::State`.
///
/// Immutable after startup.
pub struct AppState {
    /// Process-wide configuration.
    pub config: Config,
}

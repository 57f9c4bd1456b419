//! Session management core for the mobile client.
//!
//! This crate owns the only part of the client with real concurrency hazards:
//! the session state machine, the single-flight token-refresh coordinator,
//! and the request pipeline that transparently repairs expired credentials
//! for in-flight API calls.
//!
//! - [`SessionStore`]: session status, access token, and user profile,
//!   mutated only through bootstrap / sign-in / sign-up / sign-out / refresh
//! - [`RefreshGate`]: collapses concurrent refresh attempts into one network call
//! - [`RequestPipeline`]: attaches bearer credentials and retries a request
//!   exactly once after a 401-triggered token rotation
//!
//! Screen rendering, navigation, and form validation live elsewhere; the
//! identity service and the secure keystore are reached through the
//! [`IdentityApi`] and [`TokenStore`] traits.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{
    ApiError, ApiRequest, ApiResponse, ErrorBody, HttpIdentityClient, HttpTransport, IdentityApi,
    RequestPipeline, Transport,
};
pub use auth::{RefreshGate, SessionStatus, SessionStore};
pub use config::{Config, ConfigError};
pub use models::{RegisterInput, TokenPair, UserProfile};
pub use storage::{KeychainTokenStore, MemoryTokenStore, TokenStore};

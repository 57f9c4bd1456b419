//! Durable token persistence.
//!
//! The session core persists exactly one value: the refresh token. It is
//! consumed through the [`TokenStore`] contract so the state machine never
//! depends on a concrete keystore:
//! - [`KeychainTokenStore`]: OS keychain via the `keyring` crate
//! - [`MemoryTokenStore`]: process-local fallback for platforms without a
//!   secure keystore
//!
//! Storage is best-effort by contract: a failing backend degrades to "no
//! persisted token" and must never take the session core down with it.

pub mod keychain;
pub mod memory;

use async_trait::async_trait;

pub use keychain::KeychainTokenStore;
pub use memory::MemoryTokenStore;

/// Key-value persistence for the refresh token.
///
/// All operations are best-effort: `get` answers `None` both for a missing
/// key and for a backend failure, and `set`/`delete` swallow backend errors
/// (logging them) rather than surfacing them to the session core.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn delete(&self, key: &str);
}

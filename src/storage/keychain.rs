use async_trait::async_trait;
use keyring::Entry;
use tracing::warn;

use super::TokenStore;

/// Token store backed by the OS keychain.
///
/// `keyring` calls are blocking, so each operation is moved onto the
/// blocking thread pool to keep the cooperative scheduler responsive.
pub struct KeychainTokenStore {
    service: String,
}

impl KeychainTokenStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, keyring::Error> {
        Entry::new(&self.service, key)
    }
}

#[async_trait]
impl TokenStore for KeychainTokenStore {
    async fn get(&self, key: &str) -> Option<String> {
        let entry = match self.entry(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Failed to open keychain entry");
                return None;
            }
        };

        let result = tokio::task::spawn_blocking(move || entry.get_password()).await;
        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(keyring::Error::NoEntry)) => None,
            Ok(Err(e)) => {
                warn!(key, error = %e, "Failed to read from keychain");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Keychain read task failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        let entry = match self.entry(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Failed to open keychain entry");
                return;
            }
        };

        let value = value.to_string();
        let result = tokio::task::spawn_blocking(move || entry.set_password(&value)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(key, error = %e, "Failed to write to keychain"),
            Err(e) => warn!(key, error = %e, "Keychain write task failed"),
        }
    }

    async fn delete(&self, key: &str) {
        let entry = match self.entry(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Failed to open keychain entry");
                return;
            }
        };

        let result = tokio::task::spawn_blocking(move || entry.delete_credential()).await;
        match result {
            Ok(Ok(())) | Ok(Err(keyring::Error::NoEntry)) => {}
            Ok(Err(e)) => warn!(key, error = %e, "Failed to delete from keychain"),
            Err(e) => warn!(key, error = %e, "Keychain delete task failed"),
        }
    }
}

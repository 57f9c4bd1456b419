use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::TokenStore;

/// Process-local token store for platforms without a secure keystore.
///
/// Nothing survives a restart, which degrades cleanly to "no persisted
/// token" on the next bootstrap.
#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }

    async fn delete(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

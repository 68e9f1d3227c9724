//! In-memory keychain backend

use dashmap::DashMap;

use crate::types::KeychainError;

use super::store::KeychainStore;

/// Non-durable backend, useful for tests and throwaway deployments.
#[derive(Debug, Default)]
pub struct MemoryKeychainStore {
    entries: DashMap<String, String>,
}

impl MemoryKeychainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl KeychainStore for MemoryKeychainStore {
    async fn read(&self, key: &str) -> Result<Option<String>, KeychainError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

//! Keychain facade and backend trait

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::types::KeychainError;

/// Durable byte storage behind a [`Keychain`].
///
/// Implementations must make `write` atomic from the reader's point of view
/// and serialize concurrent writes to the same key.
#[async_trait::async_trait]
pub trait KeychainStore: Send + Sync {
    /// Read the entry stored under `key`, `None` if it was never written.
    async fn read(&self, key: &str) -> Result<Option<String>, KeychainError>;

    /// Replace the entry stored under `key`.
    async fn write(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Named keychain that validates and canonicalizes entries.
#[derive(Clone)]
pub struct Keychain {
    id: String,
    store: Arc<dyn KeychainStore>,
}

impl Keychain {
    pub fn new(id: impl Into<String>, store: Arc<dyn KeychainStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// Fetch the entry for `reference`.
    pub async fn get(&self, reference: &str) -> Result<String, KeychainError> {
        validate_reference(reference)?;

        let value = self
            .store
            .read(reference)
            .await?
            .ok_or_else(|| KeychainError::NotFound(reference.to_string()))?;

        debug!(keychain = %self.id, reference = %reference, "Read keychain entry");
        Ok(value)
    }

    /// Fetch and parse the entry for `reference`.
    pub async fn get_json(&self, reference: &str) -> Result<serde_json::Value, KeychainError> {
        let raw = self.get(reference).await?;
        serde_json::from_str(&raw).map_err(|e| KeychainError::InvalidEntry(e.to_string()))
    }

    /// Store `entry` under `reference`, replacing any previous entry.
    ///
    /// The entry must be valid JSON; it is persisted pretty-printed so
    /// whitespace in the input is not significant.
    pub async fn set(&self, reference: &str, entry: &str) -> Result<(), KeychainError> {
        validate_reference(reference)?;
        let canonical = canonicalize_entry(entry)?;

        self.store.write(reference, &canonical).await?;

        debug!(keychain = %self.id, reference = %reference, "Wrote keychain entry");
        Ok(())
    }

    /// Store an already parsed entry.
    pub async fn set_json(
        &self,
        reference: &str,
        entry: &serde_json::Value,
    ) -> Result<(), KeychainError> {
        let raw = serde_json::to_string(entry)
            .map_err(|e| KeychainError::InvalidEntry(e.to_string()))?;
        self.set(reference, &raw).await
    }
}

/// Parse `entry` and re-serialize it with four-space indentation.
pub fn canonicalize_entry(entry: &str) -> Result<String, KeychainError> {
    let value: serde_json::Value =
        serde_json::from_str(entry).map_err(|e| KeychainError::InvalidEntry(e.to_string()))?;

    let mut out = Vec::with_capacity(entry.len());
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| KeychainError::InvalidEntry(e.to_string()))?;

    String::from_utf8(out).map_err(|e| KeychainError::InvalidEntry(e.to_string()))
}

/// Reject references that could escape a storage partition.
pub fn validate_reference(reference: &str) -> Result<(), KeychainError> {
    let invalid = reference.is_empty()
        || reference == "."
        || reference.contains("..")
        || reference
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control());

    if invalid {
        return Err(KeychainError::InvalidReference(reference.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::MemoryKeychainStore;

    fn keychain() -> Keychain {
        Keychain::new("certStore", Arc::new(MemoryKeychainStore::new()))
    }

    #[test]
    fn test_canonicalize_ignores_whitespace() {
        let compact = canonicalize_entry(r#"{"type":"X.509","mspId":"Org1MSP"}"#).unwrap();
        let spaced = canonicalize_entry("{ \"type\" : \"X.509\",\n  \"mspId\":\"Org1MSP\" }").unwrap();
        assert_eq!(compact, spaced);
        assert!(compact.contains("\n    \""));
    }

    #[test]
    fn test_canonicalize_rejects_invalid_json() {
        let err = canonicalize_entry("not json").unwrap_err();
        assert!(matches!(err, KeychainError::InvalidEntry(_)));
    }

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("alice-DEFAULT").is_ok());
        assert!(validate_reference("user@org1.example.com-VAULT").is_ok());

        for bad in ["", ".", "../etc-DEFAULT", "a/b-DEFAULT", "a\\b", "nul\0-VAULT"] {
            assert!(
                matches!(
                    validate_reference(bad),
                    Err(KeychainError::InvalidReference(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let kc = keychain();
        let err = kc.get("ghost-DEFAULT").await.unwrap_err();
        assert!(matches!(err, KeychainError::NotFound(ref r) if r == "ghost-DEFAULT"));
    }

    #[tokio::test]
    async fn test_round_trip_is_structurally_equal() {
        let kc = keychain();
        let written = r#"{"credentials":{"certificate":"-----BEGIN CERTIFICATE-----"},"mspId":"Org1MSP","type":"X.509"}"#;

        kc.set("alice-DEFAULT", written).await.unwrap();
        let read = kc.get("alice-DEFAULT").await.unwrap();

        let expected: serde_json::Value = serde_json::from_str(written).unwrap();
        let actual: serde_json::Value = serde_json::from_str(&read).unwrap();
        assert_eq!(expected, actual);
        assert_eq!(read, canonicalize_entry(written).unwrap());
    }

    #[tokio::test]
    async fn test_set_rejects_invalid_entry_without_writing() {
        let kc = keychain();
        let err = kc.set("alice-DEFAULT", "{broken").await.unwrap_err();
        assert!(matches!(err, KeychainError::InvalidEntry(_)));
        assert!(matches!(
            kc.get("alice-DEFAULT").await,
            Err(KeychainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let kc = keychain();
        kc.set("alice-DEFAULT", r#"{"version":1}"#).await.unwrap();
        kc.set("alice-DEFAULT", r#"{"version":2}"#).await.unwrap();

        let value = kc.get_json("alice-DEFAULT").await.unwrap();
        assert_eq!(value["version"], 2);
    }
}

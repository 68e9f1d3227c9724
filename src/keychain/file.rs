//! Filesystem keychain backend
//!
//! One JSON file per reference inside a per-organization partition
//! directory (`<base>/.certStore.<org>/<ref>.json`). Writes go to a sibling
//! temp file that is renamed over the target, so readers never see a torn
//! entry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::types::KeychainError;

use super::store::KeychainStore;

/// Directory-per-organization keychain backend.
pub struct FileKeychainStore {
    root: PathBuf,
    /// Serializes writers per reference
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileKeychainStore {
    /// Open (and provision on first use) the partition for `org_name`.
    pub fn open(base_dir: impl AsRef<Path>, org_name: &str) -> Result<Self, KeychainError> {
        if org_name.is_empty() || org_name.contains(['/', '\\']) || org_name.contains("..") {
            return Err(KeychainError::InvalidReference(org_name.to_string()));
        }

        let root = base_dir.as_ref().join(format!(".certStore.{}", org_name));
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
            info!(path = %root.display(), "Provisioned keychain partition");
        } else {
            sweep_temp_files(&root)?;
        }

        Ok(Self {
            root,
            write_locks: DashMap::new(),
        })
    }

    /// Partition directory; fixed for the lifetime of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock for `key` once no writer holds or awaits it.
    fn release_lock(&self, key: &str) {
        self.write_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn write_locked(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let target = self.entry_path(key);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&tmp, value.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            warn!(path = %target.display(), error = %e, "Keychain rename failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %target.display(), "Persisted keychain entry");
        Ok(())
    }
}

/// Remove temp files left by writes that never reached their rename.
fn sweep_temp_files(root: &Path) -> Result<(), KeychainError> {
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') && name.ends_with(".tmp") {
            warn!(file = %name, "Removing stale keychain temp file");
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl KeychainStore for FileKeychainStore {
    async fn read(&self, key: &str) -> Result<Option<String>, KeychainError> {
        match tokio::fs::read_to_string(self.entry_path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let lock = self.lock_for(key);
        let result = {
            let _guard = lock.lock().await;
            self.write_locked(key, value).await
        };
        drop(lock);
        self.release_lock(key);
        result
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::Keychain;

    #[test]
    fn test_open_provisions_partition() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeychainStore::open(dir.path(), "org1").unwrap();

        assert!(store.root().is_dir());
        assert!(store.root().ends_with(".certStore.org1"));

        // Opening again reuses the existing partition
        let again = FileKeychainStore::open(dir.path(), "org1").unwrap();
        assert_eq!(again.root(), store.root());
    }

    #[test]
    fn test_open_rejects_bad_org() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileKeychainStore::open(dir.path(), "").is_err());
        assert!(FileKeychainStore::open(dir.path(), "../org1").is_err());
    }

    #[tokio::test]
    async fn test_organizations_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let org1 = Keychain::new(
            "certStore",
            Arc::new(FileKeychainStore::open(dir.path(), "org1").unwrap()),
        );
        let org2 = Keychain::new(
            "certStore",
            Arc::new(FileKeychainStore::open(dir.path(), "org2").unwrap()),
        );

        org1.set("alice-DEFAULT", r#"{"mspId":"Org1MSP"}"#).await.unwrap();

        assert!(org2.get("alice-DEFAULT").await.is_err());
        assert_eq!(
            org1.get_json("alice-DEFAULT").await.unwrap()["mspId"],
            "Org1MSP"
        );
    }

    #[tokio::test]
    async fn test_entry_is_pretty_printed_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileKeychainStore::open(dir.path(), "org1").unwrap());
        let keychain = Keychain::new("certStore", store.clone());

        keychain
            .set("alice-DEFAULT", r#"{"type":"X.509"}"#)
            .await
            .unwrap();

        let on_disk = std::fs::read_to_string(store.root().join("alice-DEFAULT.json")).unwrap();
        assert_eq!(on_disk, "{\n    \"type\": \"X.509\"\n}");
        assert_eq!(keychain.get("alice-DEFAULT").await.unwrap(), on_disk);
    }

    #[tokio::test]
    async fn test_concurrent_writes_are_never_torn() {
        let dir = tempfile::tempdir().unwrap();
        let keychain = Keychain::new(
            "certStore",
            Arc::new(FileKeychainStore::open(dir.path(), "org1").unwrap()),
        );

        let mut handles = Vec::new();
        for i in 0..16 {
            let kc = keychain.clone();
            handles.push(tokio::spawn(async move {
                let entry = serde_json::json!({ "writer": i, "padding": "x".repeat(4096) });
                kc.set_json("bob-VAULT", &entry).await.unwrap();
                let read = kc.get_json("bob-VAULT").await.unwrap();
                assert!(read["writer"].is_u64());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let last = keychain.get_json("bob-VAULT").await.unwrap();
        assert!(last["writer"].as_u64().unwrap() < 16);

        // No temp files are left behind
        let leftovers = std::fs::read_dir(dir.path().join(".certStore.org1"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_write_locks_are_released() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileKeychainStore::open(dir.path(), "org1").unwrap());
        let keychain = Keychain::new("certStore", store.clone());

        for user in ["alice", "bob", "carol"] {
            keychain
                .set(&format!("{user}-DEFAULT"), r#"{"type":"X.509"}"#)
                .await
                .unwrap();
        }
        assert!(store.write_locks.is_empty());
    }

    #[test]
    fn test_open_sweeps_stale_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeychainStore::open(dir.path(), "org1").unwrap();
        let stale = store.root().join(".alice-DEFAULT.0123456789abcdef.tmp");
        let entry = store.root().join("alice-DEFAULT.json");
        std::fs::write(&stale, "{").unwrap();
        std::fs::write(&entry, "{}").unwrap();

        let reopened = FileKeychainStore::open(dir.path(), "org1").unwrap();
        assert!(!stale.exists());
        assert!(entry.exists());
        assert_eq!(reopened.root(), store.root());
    }
}

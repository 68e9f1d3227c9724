//! Keychain for per-identity certificate material
//!
//! Stores the certificate/key bundle of every enrolled identity, keyed by the
//! keychain reference `<username>-<signingType>`.
//!
//! # Architecture
//!
//! ```text
//!   ConnectorExecutor ──▶ Keychain (id, canonical JSON, ref checks)
//!                              │
//!                              ▼
//!                     dyn KeychainStore
//!                       ├── FileKeychainStore    .certStore.<org>/<ref>.json
//!                       └── MemoryKeychainStore  tests / ephemeral runs
//! ```
//!
//! Entries are never deleted here. Writes are last-writer-wins and a reader
//! always sees either the previous or the new entry in full.

pub mod file;
pub mod memory;
pub mod store;

pub use file::FileKeychainStore;
pub use memory::MemoryKeychainStore;
pub use store::{canonicalize_entry, validate_reference, Keychain, KeychainStore};

//! Signing identities for ledger operations
//!
//! Every gateway operation is signed by exactly one identity. The caller
//! names it with `username` + `signingType`; the resolver turns that into a
//! [`SigningCredential`] the ledger executor understands.
//!
//! # Identity sources
//!
//! ```text
//!   signingType=DEFAULT ──▶ Local        cert + key in the keychain
//!   signingType=VAULT   ──▶ VaultBacked  cert in the keychain,
//!                                        key held by the transit vault
//!                                        (Authorization: <scheme> base64(keyName:token))
//! ```
//!
//! The vault key is only constructible on the `VaultBacked` variant, so a
//! local credential can never carry a token.

pub mod credential;
pub mod resolver;

pub use credential::{IdentityType, SigningCredential, SigningType, VaultKey};
pub use resolver::{parse_vault_authorization, CredentialResolver};

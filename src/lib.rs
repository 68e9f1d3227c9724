//! Fabric Doorway - identity-routing gateway for a Fabric ledger network
//!
//! Callers never hold network credentials. They name an identity
//! (`username` + `signingType`) and, for vault-backed identities, present a
//! transit key and token in the `Authorization` header. The gateway resolves
//! that into a signing credential and hands the operation to a ledger
//! executor that owns the keychain.
//!
//! ## Modules
//!
//! - **signing**: Signing credentials and the credential resolver
//! - **keychain**: Per-organization identity material storage
//! - **ledger**: Executor seam and the HTTP connector implementation
//! - **gateway**: Enroll, register, rotateKey, query and invoke
//! - **routes** / **server**: HTTP surface

pub mod config;
pub mod gateway;
pub mod keychain;
pub mod ledger;
pub mod routes;
pub mod server;
pub mod signing;
pub mod types;

pub use config::{Args, CaIdentityConfig};
pub use gateway::IdentityGateway;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};

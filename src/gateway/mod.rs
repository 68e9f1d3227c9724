//! Identity gateway
//!
//! Every operation runs the same pipeline:
//!
//! ```text
//!   validate ──▶ resolve credential ──▶ delegate to LedgerExecutor ──▶ outcome
//!     400              404                         405
//! ```
//!
//! The gateway holds no mutable state; it is shared across requests behind
//! an `Arc`.

pub mod service;
pub mod validation;

pub use service::{IdentityGateway, Operation, Outcome};
pub use validation::{form_to_json, BodyInput, RequestInput, Validator};

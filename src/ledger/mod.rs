//! Ledger executor seam
//!
//! The gateway never talks to peers, orderers or the CA itself. It hands a
//! [`SigningCredential`] and the operation parameters to a [`LedgerExecutor`].
//! [`ConnectorExecutor`] is the production implementation: it forwards calls
//! to a ledger connector service over HTTP and keeps the keychain in sync.

pub mod connector;

use serde::Serialize;

use crate::signing::SigningCredential;
use crate::types::Result;

pub use connector::{ConnectorConfig, ConnectorExecutor};

/// Parameters for enrolling an identity with the CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    #[serde(rename = "enrollmentID")]
    pub enrollment_id: String,
    pub enrollment_secret: String,
    pub ca_id: String,
    pub msp_id: String,
}

/// Parameters for registering a new identity at the CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(rename = "enrollmentID")]
    pub enrollment_id: String,
    pub affiliation: String,
}

/// Parameters for re-enrolling an identity with a fresh key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationRequest {
    #[serde(rename = "enrollmentID")]
    pub enrollment_id: String,
    pub enrollment_secret: String,
    pub ca_id: String,
}

/// Whether a chaincode call is evaluated or submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvocationType {
    /// Evaluate on a peer, no ledger write
    #[serde(rename = "FabricContractInvocationType.CALL")]
    Call,
    /// Endorse, order and commit
    #[serde(rename = "FabricContractInvocationType.SEND")]
    Send,
}

/// Chaincode call parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactRequest {
    pub channel_name: String,
    pub contract_name: String,
    pub method_name: String,
    pub params: Vec<String>,
    pub invocation_type: InvocationType,
}

/// Operations the gateway delegates to the ledger side.
///
/// Errors carry a human-readable message that is returned to the caller as-is.
#[async_trait::async_trait]
pub trait LedgerExecutor: Send + Sync {
    /// Obtain a certificate for `request.enrollment_id` and store it under the
    /// credential's keychain reference.
    async fn enroll(&self, credential: &SigningCredential, request: EnrollmentRequest)
        -> Result<()>;

    /// Register a new identity, signed by `credential`. Returns the enrollment secret.
    async fn register(
        &self,
        credential: &SigningCredential,
        request: RegistrationRequest,
        ca_id: &str,
    ) -> Result<String>;

    /// Replace the identity's key and certificate.
    async fn rotate_key(&self, credential: &SigningCredential, request: RotationRequest)
        -> Result<()>;

    /// Run a chaincode function. Returns the raw function output.
    async fn transact(
        &self,
        credential: &SigningCredential,
        request: TransactRequest,
    ) -> Result<String>;
}

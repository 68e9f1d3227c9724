//! Gateway operations: enroll, register, rotateKey, query, invoke

use std::sync::Arc;

use hyper::StatusCode;
use tracing::{debug, info};

use crate::config::CaIdentityConfig;
use crate::ledger::{
    EnrollmentRequest, InvocationType, LedgerExecutor, RegistrationRequest, RotationRequest,
    TransactRequest,
};
use crate::signing::{CredentialResolver, SigningCredential, SigningType};
use crate::types::{GatewayError, Result};

use super::validation::{RequestInput, Validator};

/// The five operations the gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Enroll,
    Register,
    RotateKey,
    Query,
    Invoke,
}

impl Operation {
    /// Log tag
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Enroll => "#enroll",
            Self::Register => "#register",
            Self::RotateKey => "#rotateKey",
            Self::Query => "#query",
            Self::Invoke => "#invoke",
        }
    }

    /// Short label returned as `msg` in failure responses.
    pub fn failure_label(&self) -> &'static str {
        match self {
            Self::Enroll => "failed to enroll",
            Self::Register => "failed to register",
            Self::RotateKey => "failed to rotate key",
            Self::Query => "failed to query",
            Self::Invoke => "failed to invoke",
        }
    }
}

/// Successful result of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Enrolled,
    Registered { enrollment_secret: String },
    KeyRotated,
    /// Query output, decoded
    Queried(serde_json::Value),
    /// Invoke output, passed through undecoded
    Invoked(String),
}

impl Outcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Enrolled | Self::Registered { .. } | Self::KeyRotated => StatusCode::CREATED,
            Self::Queried(_) | Self::Invoked(_) => StatusCode::OK,
        }
    }
}

/// Identity selected by a validated request.
struct Caller {
    username: String,
    signing_type: SigningType,
}

/// Stateless request handler shared by all connections.
pub struct IdentityGateway {
    identity: CaIdentityConfig,
    resolver: CredentialResolver,
    executor: Arc<dyn LedgerExecutor>,
    channel_name: String,
    contract_name: String,
}

impl IdentityGateway {
    pub fn new(
        identity: CaIdentityConfig,
        resolver: CredentialResolver,
        executor: Arc<dyn LedgerExecutor>,
    ) -> Self {
        Self {
            identity,
            resolver,
            executor,
            channel_name: "mychannel".to_string(),
            contract_name: "basic".to_string(),
        }
    }

    /// Override the channel and contract used by query/invoke.
    pub fn with_contract(mut self, channel_name: &str, contract_name: &str) -> Self {
        self.channel_name = channel_name.to_string();
        self.contract_name = contract_name.to_string();
        self
    }

    pub fn identity(&self) -> &CaIdentityConfig {
        &self.identity
    }

    /// Run `op` against `input`.
    pub async fn handle(&self, op: Operation, input: &RequestInput) -> Result<Outcome> {
        match op {
            Operation::Enroll => self.enroll(input).await,
            Operation::Register => self.register(input).await,
            Operation::RotateKey => self.rotate_key(input).await,
            Operation::Query => self.transact(Operation::Query, input).await,
            Operation::Invoke => self.transact(Operation::Invoke, input).await,
        }
    }

    /// POST /ca/enroll
    pub async fn enroll(&self, input: &RequestInput) -> Result<Outcome> {
        let tag = Operation::Enroll.tag();

        let mut v = Validator::new();
        let caller = caller(&mut v, input);
        let secret = v.body_string(input, "secret");
        let (caller, secret) = finish(tag, v, caller.zip(secret))?;

        let credential = self.resolve(tag, &caller, input)?;

        debug!("{} enrolling with {}", tag, self.identity.ca_id);
        self.executor
            .enroll(
                &credential,
                EnrollmentRequest {
                    enrollment_id: caller.username.clone(),
                    enrollment_secret: secret,
                    ca_id: self.identity.ca_id.clone(),
                    msp_id: self.identity.msp_id.clone(),
                },
            )
            .await
            .map_err(|e| {
                info!(
                    "{} failed to enroll {} of type = {}",
                    tag, caller.username, caller.signing_type
                );
                e
            })?;

        info!(
            "{} success enrolling {} of type = {}",
            tag, caller.username, caller.signing_type
        );
        Ok(Outcome::Enrolled)
    }

    /// POST /ca/register
    ///
    /// `username` is the registrar whose identity signs the request;
    /// `enrollmentId` is the identity being created.
    pub async fn register(&self, input: &RequestInput) -> Result<Outcome> {
        let tag = Operation::Register.tag();

        let mut v = Validator::new();
        let caller = caller(&mut v, input);
        let enrollment_id = v.query_string(input, "enrollmentId");
        let (caller, enrollment_id) = finish(tag, v, caller.zip(enrollment_id))?;

        let credential = self.resolve(tag, &caller, input)?;

        debug!("{} registering with {}", tag, self.identity.ca_id);
        let enrollment_secret = self
            .executor
            .register(
                &credential,
                RegistrationRequest {
                    enrollment_id,
                    affiliation: self.identity.affiliation.clone(),
                },
                &self.identity.ca_id,
            )
            .await
            .map_err(|e| {
                info!(
                    "{} failed to register {} of type = {}",
                    tag, caller.username, caller.signing_type
                );
                e
            })?;

        info!(
            "{} success registered {} of type = {}",
            tag, caller.username, caller.signing_type
        );
        Ok(Outcome::Registered { enrollment_secret })
    }

    /// POST /ca/rotateKey
    pub async fn rotate_key(&self, input: &RequestInput) -> Result<Outcome> {
        let tag = Operation::RotateKey.tag();

        let mut v = Validator::new();
        let caller = caller(&mut v, input);
        let secret = v.body_string(input, "secret");
        let (caller, secret) = finish(tag, v, caller.zip(secret))?;

        let credential = self.resolve(tag, &caller, input)?;

        self.executor
            .rotate_key(
                &credential,
                RotationRequest {
                    enrollment_id: caller.username.clone(),
                    enrollment_secret: secret,
                    ca_id: self.identity.ca_id.clone(),
                },
            )
            .await
            .map_err(|e| {
                info!(
                    "{} failed to rotate key of {}, type = {}",
                    tag, caller.username, caller.signing_type
                );
                e
            })?;

        info!(
            "{} success rotating key of {} of type = {}",
            tag, caller.username, caller.signing_type
        );
        Ok(Outcome::KeyRotated)
    }

    /// GET /fabric (query) and POST /fabric (invoke)
    ///
    /// Query output is decoded as JSON; invoke output is returned raw.
    async fn transact(&self, op: Operation, input: &RequestInput) -> Result<Outcome> {
        let tag = op.tag();

        let mut v = Validator::new();
        let caller = caller(&mut v, input);
        let method = v.query_string(input, "ccMethod");
        let params = v.query_array(input, "ccParams");
        let (caller, method) = finish(tag, v, caller.zip(method))?;

        debug!(
            "{} user = {} making {} to fabric, identity type = {}",
            tag,
            caller.username,
            if op == Operation::Query { "query" } else { "invoke" },
            caller.signing_type
        );
        let credential = self.resolve(tag, &caller, input)?;

        let invocation_type = match op {
            Operation::Query => InvocationType::Call,
            _ => InvocationType::Send,
        };

        debug!("{} calling {} on {}", tag, method, self.contract_name);
        let output = self
            .executor
            .transact(
                &credential,
                TransactRequest {
                    channel_name: self.channel_name.clone(),
                    contract_name: self.contract_name.clone(),
                    method_name: method,
                    params,
                    invocation_type,
                },
            )
            .await
            .map_err(|e| {
                info!(
                    "{} failed using identity of {}, typed = {}",
                    tag, caller.username, caller.signing_type
                );
                e
            })?;

        debug!("{} response from fabric = {}", tag, output);

        match op {
            Operation::Query => serde_json::from_str(&output)
                .map(Outcome::Queried)
                .map_err(|e| {
                    info!("{} ledger output for {} is not JSON", tag, caller.username);
                    GatewayError::Decode(e.to_string())
                }),
            _ => Ok(Outcome::Invoked(output)),
        }
    }

    fn resolve(&self, tag: &str, caller: &Caller, input: &RequestInput) -> Result<SigningCredential> {
        info!(
            "{} id = {} , identity type = {}",
            tag, caller.username, caller.signing_type
        );
        self.resolver
            .resolve(
                &caller.username,
                caller.signing_type,
                input.authorization.as_deref(),
            )
            .map_err(|e| {
                info!("{} : {}", tag, e);
                e
            })
    }
}

/// Collect the identity fields shared by every operation.
fn caller(v: &mut Validator, input: &RequestInput) -> Option<Caller> {
    let signing_type = v.signing_type(input);
    let username = v.query_string(input, "username");
    Some(Caller {
        username: username?,
        signing_type: signing_type?,
    })
}

fn finish<T>(tag: &str, v: Validator, fields: Option<T>) -> Result<T> {
    match (v.finish(), fields) {
        (Ok(()), Some(fields)) => Ok(fields),
        (Err(violations), _) => {
            debug!("{} rejected request: {} violation(s)", tag, violations.len());
            Err(GatewayError::Validation(violations))
        }
        (Ok(()), None) => Err(GatewayError::Internal(format!(
            "{} validation passed without all fields",
            tag
        ))),
    }
}

// =============================================================================
// Tests
// =============================================================================

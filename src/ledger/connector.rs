//! HTTP client for the ledger connector service
//!
//! The connector owns the Fabric SDK: it talks to the CA, peers and orderers
//! and, for vault-backed identities, asks the transit vault to sign. This
//! client adds the keychain on top:
//!
//! - `enroll` / `rotate_key` persist the identity material the connector returns
//! - `register` / `transact` load the caller's material and send it along
//!
//! ## Endpoints
//!
//! - `POST {base}/enroll`     -> `{ "identity": {...} }`
//! - `POST {base}/register`   -> `{ "enrollmentSecret": "..." }`
//! - `POST {base}/rotate-key` -> `{ "identity": {...} }`
//! - `POST {base}/transact`   -> `{ "functionOutput": "...", "success": true }`

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::keychain::Keychain;
use crate::signing::SigningCredential;
use crate::types::{GatewayError, Result};

use super::{
    EnrollmentRequest, InvocationType, LedgerExecutor, RegistrationRequest, RotationRequest,
    TransactRequest,
};

/// Connector client configuration
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Base URL of the connector (no trailing slash needed)
    pub base_url: String,
    /// Transit vault endpoint, forwarded for vault-backed identities
    pub vault_endpoint: String,
    /// Transit engine mount path
    pub vault_transit_mount: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            vault_endpoint: "http://localhost:8200".to_string(),
            vault_transit_mount: "/transit".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectorConfig {
    /// Build from CLI arguments
    pub fn from_args(args: &crate::config::Args) -> Self {
        Self {
            base_url: args.connector_url.clone(),
            vault_endpoint: args.vault_endpoint.clone(),
            vault_transit_mount: args.vault_transit_mount.clone(),
            request_timeout: args.request_timeout(),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VaultConfigWire<'a> {
    endpoint: &'a str,
    transit_engine_mount_path: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrollWire<'a> {
    signing_credential: &'a SigningCredential,
    #[serde(skip_serializing_if = "Option::is_none")]
    vault_config: Option<VaultConfigWire<'a>>,
    #[serde(flatten)]
    request: &'a EnrollmentRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterWire<'a> {
    signing_credential: &'a SigningCredential,
    #[serde(skip_serializing_if = "Option::is_none")]
    vault_config: Option<VaultConfigWire<'a>>,
    identity: &'a serde_json::Value,
    #[serde(flatten)]
    request: &'a RegistrationRequest,
    ca_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RotateWire<'a> {
    signing_credential: &'a SigningCredential,
    #[serde(skip_serializing_if = "Option::is_none")]
    vault_config: Option<VaultConfigWire<'a>>,
    identity: &'a serde_json::Value,
    #[serde(flatten)]
    request: &'a RotationRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactWire<'a> {
    signing_credential: &'a SigningCredential,
    #[serde(skip_serializing_if = "Option::is_none")]
    vault_config: Option<VaultConfigWire<'a>>,
    identity: &'a serde_json::Value,
    channel_name: &'a str,
    contract_name: &'a str,
    method_name: &'a str,
    params: &'a [String],
    invocation_type: InvocationType,
}

#[derive(Deserialize)]
struct IdentityReply {
    identity: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterReply {
    enrollment_secret: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactReply {
    function_output: String,
    #[serde(default = "default_success")]
    success: bool,
}

fn default_success() -> bool {
    true
}

#[derive(Deserialize)]
struct ErrorReply {
    #[serde(alias = "message")]
    error: String,
}

// =============================================================================
// Connector Executor
// =============================================================================

/// [`LedgerExecutor`] backed by a remote connector and a local keychain.
pub struct ConnectorExecutor {
    config: ConnectorConfig,
    keychain: Keychain,
    http_client: reqwest::Client,
}

impl ConnectorExecutor {
    pub fn new(config: ConnectorConfig, keychain: Keychain) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            keychain,
            http_client,
        })
    }

    pub fn keychain(&self) -> &Keychain {
        &self.keychain
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn vault_config(&self, credential: &SigningCredential) -> Option<VaultConfigWire<'_>> {
        credential.vault_key().map(|_| VaultConfigWire {
            endpoint: &self.config.vault_endpoint,
            transit_engine_mount_path: &self.config.vault_transit_mount,
        })
    }

    /// The credential must name the keychain this executor owns.
    fn check_keychain(&self, credential: &SigningCredential) -> Result<()> {
        if credential.keychain_id() != self.keychain.id() {
            return Err(GatewayError::Executor(format!(
                "keychain '{}' not found",
                credential.keychain_id()
            )));
        }
        Ok(())
    }

    async fn load_identity(&self, credential: &SigningCredential) -> Result<serde_json::Value> {
        self.check_keychain(credential)?;
        Ok(self.keychain.get_json(credential.keychain_ref()).await?)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.endpoint(path);
        debug!(url = %url, "Calling ledger connector");

        let response = self.http_client.post(&url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorReply>(&bytes)
                .map(|e| e.error)
                .ok()
                .or_else(|| {
                    let text = String::from_utf8_lossy(&bytes).trim().to_string();
                    (!text.is_empty()).then_some(text)
                })
                .unwrap_or_else(|| format!("connector returned {}", status));
            warn!(url = %url, status = %status, error = %message, "Ledger connector rejected call");
            return Err(GatewayError::Executor(message));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::Executor(format!("invalid connector response: {e}")))
    }
}

#[async_trait::async_trait]
impl LedgerExecutor for ConnectorExecutor {
    async fn enroll(
        &self,
        credential: &SigningCredential,
        request: EnrollmentRequest,
    ) -> Result<()> {
        self.check_keychain(credential)?;

        let reply: IdentityReply = self
            .post(
                "enroll",
                &EnrollWire {
                    signing_credential: credential,
                    vault_config: self.vault_config(credential),
                    request: &request,
                },
            )
            .await?;

        self.keychain
            .set_json(credential.keychain_ref(), &reply.identity)
            .await?;
        Ok(())
    }

    async fn register(
        &self,
        credential: &SigningCredential,
        request: RegistrationRequest,
        ca_id: &str,
    ) -> Result<String> {
        let identity = self.load_identity(credential).await?;

        let reply: RegisterReply = self
            .post(
                "register",
                &RegisterWire {
                    signing_credential: credential,
                    vault_config: self.vault_config(credential),
                    identity: &identity,
                    request: &request,
                    ca_id,
                },
            )
            .await?;

        Ok(reply.enrollment_secret)
    }

    async fn rotate_key(
        &self,
        credential: &SigningCredential,
        request: RotationRequest,
    ) -> Result<()> {
        let identity = self.load_identity(credential).await?;

        let reply: IdentityReply = self
            .post(
                "rotate-key",
                &RotateWire {
                    signing_credential: credential,
                    vault_config: self.vault_config(credential),
                    identity: &identity,
                    request: &request,
                },
            )
            .await?;

        self.keychain
            .set_json(credential.keychain_ref(), &reply.identity)
            .await?;
        Ok(())
    }

    async fn transact(
        &self,
        credential: &SigningCredential,
        request: TransactRequest,
    ) -> Result<String> {
        let identity = self.load_identity(credential).await?;

        let reply: TransactReply = self
            .post(
                "transact",
                &TransactWire {
                    signing_credential: credential,
                    vault_config: self.vault_config(credential),
                    identity: &identity,
                    channel_name: &request.channel_name,
                    contract_name: &request.contract_name,
                    method_name: &request.method_name,
                    params: &request.params,
                    invocation_type: request.invocation_type,
                },
            )
            .await?;

        if !reply.success {
            return Err(GatewayError::Executor(format!(
                "transaction {} was not successful",
                request.method_name
            )));
        }
        Ok(reply.function_output)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use crate::keychain::MemoryKeychainStore;
    use crate::signing::VaultKey;

    type Calls = Arc<Mutex<Vec<(String, Value)>>>;

    /// Start a fake connector answering every call with `handler`.
    async fn spawn_connector<F>(handler: F) -> (String, Calls)
    where
        F: Fn(&str, &Value) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = Arc::clone(&handler);
                        let recorded = Arc::clone(&recorded);
                        async move {
                            let path = req.uri().path().to_string();
                            let bytes = req.into_body().collect().await?.to_bytes();
                            let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
                            let (status, reply) = handler(&path, &body);
                            recorded.lock().unwrap().push((path, body));
                            Ok::<_, hyper::Error>(
                                Response::builder()
                                    .status(status)
                                    .header("Content-Type", "application/json")
                                    .body(Full::new(Bytes::from(reply.to_string())))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        (format!("http://{}", addr), calls)
    }

    fn executor(base_url: String) -> ConnectorExecutor {
        let keychain = Keychain::new("certStore", Arc::new(MemoryKeychainStore::new()));
        ConnectorExecutor::new(
            ConnectorConfig {
                base_url,
                ..ConnectorConfig::default()
            },
            keychain,
        )
        .unwrap()
    }

    fn enrollment() -> EnrollmentRequest {
        EnrollmentRequest {
            enrollment_id: "alice".into(),
            enrollment_secret: "s3cr3t".into(),
            ca_id: "ca.org1.example.com".into(),
            msp_id: "Org1MSP".into(),
        }
    }

    fn query(method: &str) -> TransactRequest {
        TransactRequest {
            channel_name: "mychannel".into(),
            contract_name: "basic".into(),
            method_name: method.into(),
            params: vec![],
            invocation_type: InvocationType::Call,
        }
    }

    #[tokio::test]
    async fn test_enroll_persists_identity() {
        let (url, calls) = spawn_connector(|_, _| {
            (
                StatusCode::OK,
                json!({ "identity": { "type": "X.509", "mspId": "Org1MSP" } }),
            )
        })
        .await;
        let exec = executor(url);
        let cred = SigningCredential::local("certStore", "alice");

        exec.enroll(&cred, enrollment()).await.unwrap();

        let stored = exec.keychain().get_json("alice-DEFAULT").await.unwrap();
        assert_eq!(stored["mspId"], "Org1MSP");

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, "/enroll");
        assert_eq!(calls[0].1["enrollmentID"], "alice");
        assert_eq!(calls[0].1["enrollmentSecret"], "s3cr3t");
        assert_eq!(calls[0].1["signingCredential"]["keychainRef"], "alice-DEFAULT");
        assert!(calls[0].1.get("vaultConfig").is_none());
    }

    #[tokio::test]
    async fn test_vault_credential_forwards_vault_config() {
        let (url, calls) = spawn_connector(|_, _| {
            (StatusCode::OK, json!({ "identity": { "type": "Vault-X.509" } }))
        })
        .await;
        let exec = executor(url);
        let cred =
            SigningCredential::vault_backed("certStore", "bob", VaultKey::new("keyA", "tok123"));

        exec.enroll(&cred, enrollment()).await.unwrap();

        let calls = calls.lock().unwrap();
        let body = &calls[0].1;
        assert_eq!(body["vaultConfig"]["endpoint"], "http://localhost:8200");
        assert_eq!(body["vaultConfig"]["transitEngineMountPath"], "/transit");
        assert_eq!(body["signingCredential"]["vaultTransitKey"]["keyName"], "keyA");
        assert!(exec.keychain().get("bob-VAULT").await.is_ok());
    }

    #[tokio::test]
    async fn test_connector_error_message_is_surfaced() {
        let (url, _) = spawn_connector(|_, _| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "CA unreachable" }),
            )
        })
        .await;
        let exec = executor(url);
        let cred = SigningCredential::local("certStore", "alice");

        let err = exec.enroll(&cred, enrollment()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Executor(ref m) if m == "CA unreachable"));
        assert!(exec.keychain().get("alice-DEFAULT").await.is_err());
    }

    #[tokio::test]
    async fn test_transact_requires_enrolled_identity() {
        let (url, calls) = spawn_connector(|_, _| {
            (StatusCode::OK, json!({ "functionOutput": "[]" }))
        })
        .await;
        let exec = executor(url);
        let cred = SigningCredential::local("certStore", "nobody");

        let err = exec.transact(&cred, query("GetAllAssets")).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Keychain(crate::types::KeychainError::NotFound(_))
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transact_sends_identity_and_returns_output() {
        let (url, calls) = spawn_connector(|_, _| {
            (
                StatusCode::OK,
                json!({ "functionOutput": "[{\"ID\":\"asset1\"}]", "success": true }),
            )
        })
        .await;
        let exec = executor(url);
        let cred = SigningCredential::local("certStore", "alice");
        exec.keychain()
            .set("alice-DEFAULT", r#"{"type":"X.509"}"#)
            .await
            .unwrap();

        let output = exec.transact(&cred, query("GetAllAssets")).await.unwrap();
        assert_eq!(output, "[{\"ID\":\"asset1\"}]");

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, "/transact");
        assert_eq!(calls[0].1["identity"]["type"], "X.509");
        assert_eq!(calls[0].1["methodName"], "GetAllAssets");
        assert_eq!(
            calls[0].1["invocationType"],
            "FabricContractInvocationType.CALL"
        );
    }

    #[tokio::test]
    async fn test_rotate_key_overwrites_entry() {
        let (url, _) = spawn_connector(|_, _| {
            (StatusCode::OK, json!({ "identity": { "generation": 2 } }))
        })
        .await;
        let exec = executor(url);
        let cred = SigningCredential::local("certStore", "alice");
        exec.keychain()
            .set("alice-DEFAULT", r#"{"generation":1}"#)
            .await
            .unwrap();

        exec.rotate_key(
            &cred,
            RotationRequest {
                enrollment_id: "alice".into(),
                enrollment_secret: "s3cr3t".into(),
                ca_id: "ca.org1.example.com".into(),
            },
        )
        .await
        .unwrap();

        let stored = exec.keychain().get_json("alice-DEFAULT").await.unwrap();
        assert_eq!(stored["generation"], 2);
    }

    #[tokio::test]
    async fn test_register_returns_secret() {
        let (url, calls) = spawn_connector(|_, _| {
            (StatusCode::OK, json!({ "enrollmentSecret": "newSecret" }))
        })
        .await;
        let exec = executor(url);
        let cred = SigningCredential::local("certStore", "admin");
        exec.keychain()
            .set("admin-DEFAULT", r#"{"type":"X.509"}"#)
            .await
            .unwrap();

        let secret = exec
            .register(
                &cred,
                RegistrationRequest {
                    enrollment_id: "carol".into(),
                    affiliation: "org1.department1".into(),
                },
                "ca.org1.example.com",
            )
            .await
            .unwrap();
        assert_eq!(secret, "newSecret");

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, "/register");
        assert_eq!(calls[0].1["affiliation"], "org1.department1");
        assert_eq!(calls[0].1["caId"], "ca.org1.example.com");
    }

    #[tokio::test]
    async fn test_foreign_keychain_is_rejected() {
        let exec = executor("http://127.0.0.1:9".into());
        let cred = SigningCredential::local("otherStore", "alice");

        let err = exec.enroll(&cred, enrollment()).await.unwrap_err();
        assert_eq!(err.to_string(), "keychain 'otherStore' not found");
    }
}

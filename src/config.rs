//! Configuration for the gateway
//!
//! CLI arguments and environment variable handling using clap.
//! Organization identity is derived once at startup and never changes.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Fabric Doorway - identity-routing gateway for a Fabric ledger network
#[derive(Parser, Debug, Clone)]
#[command(name = "fabric-doorway")]
#[command(about = "Enroll, register and transact against Fabric without holding network credentials")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:9999")]
    pub listen: SocketAddr,

    /// Organization this deployment acts for (e.g. org1, org2)
    #[arg(long, env = "ORG_NAME", default_value = "org1")]
    pub org_name: String,

    /// Certificate authority identifier override
    /// Defaults to ca.<org>.example.com
    #[arg(long, env = "CA_ID")]
    pub ca_id: Option<String>,

    /// MSP identifier override
    /// Defaults to the capitalised org name followed by MSP (org1 -> Org1MSP)
    #[arg(long, env = "MSP_ID")]
    pub msp_id: Option<String>,

    /// Directory under which the per-organization keychain partition lives
    #[arg(long, env = "KEYCHAIN_DIR", default_value = ".")]
    pub keychain_dir: PathBuf,

    /// Keychain identifier carried by every signing credential
    #[arg(long, env = "KEYCHAIN_ID", default_value = "certStore")]
    pub keychain_id: String,

    /// Base URL of the ledger connector service
    #[arg(long, env = "CONNECTOR_URL", default_value = "http://localhost:4000")]
    pub connector_url: String,

    /// Channel used for chaincode calls
    #[arg(long, env = "CHANNEL_NAME", default_value = "mychannel")]
    pub channel_name: String,

    /// Contract (chaincode) used for chaincode calls
    #[arg(long, env = "CONTRACT_NAME", default_value = "basic")]
    pub contract_name: String,

    /// Transit vault endpoint forwarded to the connector for vault-backed identities
    #[arg(long, env = "VAULT_ENDPOINT", default_value = "http://localhost:8200")]
    pub vault_endpoint: String,

    /// Transit engine mount path
    #[arg(long, env = "VAULT_TRANSIT_MOUNT", default_value = "/transit")]
    pub vault_transit_mount: String,

    /// Connector request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl Args {
    /// Connector request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.org_name.trim().is_empty() {
            return Err("ORG_NAME must not be empty".to_string());
        }

        if self.keychain_id.trim().is_empty() {
            return Err("KEYCHAIN_ID must not be empty".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err("LOG_FORMAT must be 'text' or 'json'".to_string());
        }

        Ok(())
    }
}

/// Organization identity as seen by the certificate authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaIdentityConfig {
    pub org_name: String,
    pub ca_id: String,
    pub msp_id: String,
    /// Affiliation assigned to newly registered identities
    pub affiliation: String,
}

impl CaIdentityConfig {
    /// Derive identifiers from an organization name.
    pub fn for_org(org_name: &str) -> Self {
        Self {
            org_name: org_name.to_string(),
            ca_id: format!("ca.{}.example.com", org_name),
            msp_id: format!("{}MSP", capitalize(org_name)),
            affiliation: format!("{}.department1", org_name),
        }
    }

    /// Derive from CLI arguments, honoring explicit overrides.
    pub fn from_args(args: &Args) -> Self {
        let mut config = Self::for_org(&args.org_name);
        if let Some(ref ca_id) = args.ca_id {
            config.ca_id = ca_id.clone();
        }
        if let Some(ref msp_id) = args.msp_id {
            config.msp_id = msp_id.clone();
        }
        config
    }

    /// Display name used in the startup banner ("org1" -> "Organizations-1").
    pub fn full_name(&self) -> String {
        let suffix = self.org_name.trim_start_matches("org");
        if suffix.is_empty() {
            format!("Organizations-{}", self.org_name)
        } else {
            format!("Organizations-{}", suffix)
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

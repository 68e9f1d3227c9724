//! Fabric Doorway - identity-routing gateway for a Fabric ledger network

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fabric_doorway::{
    config::{Args, CaIdentityConfig},
    gateway::IdentityGateway,
    keychain::{FileKeychainStore, Keychain},
    ledger::{ConnectorConfig, ConnectorExecutor},
    server::{self, AppState},
    signing::CredentialResolver,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("fabric_doorway={},info", log_level).into());
    if args.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let identity = CaIdentityConfig::from_args(&args);

    // Keychain partition: <keychain_dir>/.certStore.<org>
    let store = FileKeychainStore::open(&args.keychain_dir, &args.org_name)?;
    let keychain = Keychain::new(&args.keychain_id, Arc::new(store));

    info!("======================================");
    info!("  Fabric Doorway - {}", identity.full_name());
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("CA: {} (MSP {})", identity.ca_id, identity.msp_id);
    info!("Affiliation: {}", identity.affiliation);
    info!("Keychain: {} at {}", keychain.id(), keychain.describe());
    info!("Connector: {}", args.connector_url);
    info!(
        "Contract: {} on channel {}",
        args.contract_name, args.channel_name
    );
    info!("======================================");

    let executor = ConnectorExecutor::new(ConnectorConfig::from_args(&args), keychain.clone())?;
    let gateway = IdentityGateway::new(
        identity,
        CredentialResolver::new(&args.keychain_id),
        Arc::new(executor),
    )
    .with_contract(&args.channel_name, &args.contract_name);

    let state = Arc::new(AppState::new(args, Arc::new(gateway), keychain.describe()));

    tokio::select! {
        result = server::run(state) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}

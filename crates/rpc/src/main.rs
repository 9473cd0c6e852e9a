use std::env;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use db::TaleDatabase;
use rpc::handlers::{AppState, build_router};
use rpc::logging;
use sui::{SharedSuiState, resolve_rpc_url};
use tales::TalesService;
use walrus::{FundedSigner, WalrusClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    println!("🚀 Starting SuiTale backend");

    logging::init_logging()?;
    info!("✅ Logging initialized");

    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable must be set"))?;

    let server_address = env::var("SERVER_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());

    let rpc_url = resolve_rpc_url(None, None)?;
    SharedSuiState::initialize(&rpc_url).await?;
    info!("✅ Connected to Sui fullnode at {}", rpc_url);

    let database = Arc::new(TaleDatabase::new(&database_url).await?);
    info!("✅ Connected to tales database");

    let walrus_client = Arc::new(WalrusClient::new());
    let funded_signer = Arc::new(FundedSigner::from_env()?);

    let service = Arc::new(TalesService::new(database, walrus_client, funded_signer));
    let state = AppState { service };

    let router = build_router(state);

    info!("📡 REST API listening on {} (under /api)", server_address);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

use crate::chain::load_sender_from_env_or_key;
use anyhow::Result;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::OnceLock;
use sui_crypto::ed25519::Ed25519PrivateKey;
use sui_rpc::Client;
use sui_sdk_types as sui;
use tokio::sync::Mutex;
use tracing::info;

// Global static values initialized once from environment variables
static CHAIN: OnceLock<String> = OnceLock::new();
static TALES_PACKAGE_ID: OnceLock<sui::Address> = OnceLock::new();

// Global static SharedSuiState instance with initialization lock
static SHARED_SUI_STATE: OnceLock<Arc<SharedSuiState>> = OnceLock::new();
static INIT_LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();

/// Process-wide Sui connection state: the cloneable gRPC client, the
/// backend signer (absent in read-only mode) and the tales Move
/// package id.
pub struct SharedSuiState {
    sui_client: Client,
    sui_address: Option<sui::Address>,
    sui_private_key: Option<Ed25519PrivateKey>,
    tales_package_id: Option<sui::Address>,
}

impl SharedSuiState {
    /// Check if SharedSuiState is already initialized
    pub fn is_initialized() -> bool {
        SHARED_SUI_STATE.get().is_some()
    }

    /// Initialize the global SharedSuiState instance for read-only
    /// operations. This version doesn't require SUI_ADDRESS or
    /// SUI_SECRET_KEY.
    pub async fn initialize_read_only(rpc_url: &str) -> Result<()> {
        if Self::is_initialized() {
            return Ok(());
        }

        let init_lock = INIT_LOCK.get_or_init(|| Arc::new(Mutex::new(())));
        let _guard = init_lock.lock().await;

        // Double-check after acquiring lock (another task might have initialized)
        if Self::is_initialized() {
            return Ok(());
        }

        info!(
            "Initializing SharedSuiState (read-only mode) with RPC URL: {}",
            rpc_url
        );

        let sui_client = Client::new(rpc_url)
            .map_err(|e| anyhow::anyhow!("Failed to create Sui client: {}", e))?;

        Self::try_init_chain();
        Self::try_init_tales_package_id();

        let state = Arc::new(Self {
            sui_client,
            sui_address: None,
            sui_private_key: None,
            tales_package_id: TALES_PACKAGE_ID.get().cloned(),
        });

        SHARED_SUI_STATE
            .set(state)
            .map_err(|_| anyhow::anyhow!("Failed to set SharedSuiState - this should not happen"))?;

        Ok(())
    }

    /// Initialize the global SharedSuiState instance from the environment
    pub async fn initialize(rpc_url: &str) -> Result<()> {
        Self::initialize_with_optional_key(rpc_url, None).await
    }

    /// Initialize the global SharedSuiState instance with an optional
    /// private key overriding SUI_SECRET_KEY
    pub async fn initialize_with_optional_key(
        rpc_url: &str,
        private_key_str: Option<&str>,
    ) -> Result<()> {
        if Self::is_initialized() {
            return Ok(());
        }

        let init_lock = INIT_LOCK.get_or_init(|| Arc::new(Mutex::new(())));
        let _guard = init_lock.lock().await;

        // Double-check after acquiring lock (another task might have initialized)
        if Self::is_initialized() {
            return Ok(());
        }

        info!("Initializing SharedSuiState with RPC URL: {}", rpc_url);

        let sui_client = Client::new(rpc_url)
            .map_err(|e| anyhow::anyhow!("Failed to create Sui client: {}", e))?;

        Self::try_init_chain();
        let tales_package_id = Self::init_tales_package_id()?;

        let (sui_address, sui_private_key) =
            load_sender_from_env_or_key(private_key_str.map(|s| s.to_string()))?;

        info!("Initialized SharedSuiState with address: {}", sui_address);

        let state = Arc::new(Self {
            sui_client,
            sui_address: Some(sui_address),
            sui_private_key: Some(sui_private_key),
            tales_package_id: Some(tales_package_id),
        });

        SHARED_SUI_STATE
            .set(state)
            .map_err(|_| anyhow::anyhow!("Failed to set SharedSuiState - this should not happen"))?;

        Ok(())
    }

    /// Get the global SharedSuiState instance
    pub fn get_instance() -> Arc<SharedSuiState> {
        SHARED_SUI_STATE
            .get()
            .expect("SharedSuiState not initialized. Call SharedSuiState::initialize() first.")
            .clone()
    }

    /// Initialize chain from SUI_CHAIN environment variable (default testnet)
    fn try_init_chain() {
        CHAIN.get_or_init(|| std::env::var("SUI_CHAIN").unwrap_or_else(|_| "testnet".to_string()));
    }

    /// Initialize tales package ID from TALES_PACKAGE_ID environment variable
    fn init_tales_package_id() -> Result<sui::Address> {
        if let Some(addr) = TALES_PACKAGE_ID.get() {
            return Ok(*addr);
        }
        let package_id_str = std::env::var("TALES_PACKAGE_ID")
            .map_err(|_| anyhow::anyhow!("TALES_PACKAGE_ID environment variable must be set"))?;
        let addr = sui::Address::from_str(&package_id_str).map_err(|e| {
            anyhow::anyhow!(
                "Invalid TALES_PACKAGE_ID address format: {} (expected 0x-prefixed hex)",
                e
            )
        })?;
        Ok(*TALES_PACKAGE_ID.get_or_init(|| addr))
    }

    /// Try to initialize tales package ID without failing (read-only mode)
    fn try_init_tales_package_id() {
        if let Ok(package_id_str) = std::env::var("TALES_PACKAGE_ID") {
            if let Ok(addr) = sui::Address::from_str(&package_id_str) {
                TALES_PACKAGE_ID.get_or_init(|| addr);
            }
        }
    }

    /// Get the chain name
    pub fn get_chain(&self) -> &String {
        CHAIN.get().expect("Chain should be initialized")
    }

    pub fn get_sui_client(&self) -> Client {
        self.sui_client.clone()
    }

    /// Get the backend signer address (None in read-only mode)
    pub fn get_sui_address(&self) -> Option<sui::Address> {
        self.sui_address
    }

    /// Get the backend signer address or panic (for transaction operations)
    pub fn get_sui_address_required(&self) -> sui::Address {
        self.sui_address
            .expect("Sui address should be initialized for transaction operations")
    }

    /// Get the backend signer private key (None in read-only mode)
    #[allow(dead_code)]
    pub(crate) fn get_sui_private_key(&self) -> Option<&Ed25519PrivateKey> {
        self.sui_private_key.as_ref()
    }

    /// Get the backend signer private key or panic (for transaction operations)
    pub(crate) fn get_sui_private_key_required(&self) -> &Ed25519PrivateKey {
        self.sui_private_key
            .as_ref()
            .expect("Sui private key should be initialized for transaction operations")
    }

    /// Get the tales package ID (None when not configured)
    pub fn get_tales_package_id(&self) -> Option<sui::Address> {
        self.tales_package_id
    }

    /// Get the tales package ID or panic (for transaction operations)
    pub fn get_tales_package_id_required(&self) -> sui::Address {
        self.tales_package_id
            .expect("Tales package ID should be initialized for transaction operations")
    }
}

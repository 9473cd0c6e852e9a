use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use sui::{SharedSuiState, execute_move_call, get_wal_balance, list_coins_by_type, total_balance_mist};
use sui_sdk_types as sui_types;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::WalrusError;

const EXCHANGE_MODULE: &str = "wal_exchange";
const EXCHANGE_FOR_WAL_FUNCTION: &str = "exchange_all_for_wal";
const EXCHANGE_FOR_SUI_FUNCTION: &str = "exchange_all_for_sui";

/// Testnet WAL coin object type, overridable via WAL_COIN_TYPE
const DEFAULT_WAL_COIN_TYPE: &str =
    "0x2::coin::Coin<0x8270feb7375eee355e64fdb69c50abb6b5f9393a722883c1cf45f8e26048810a::wal::WAL>";

/// Funding thresholds and exchange contract coordinates, all read from
/// the environment so operators can tune them without a rebuild.
#[derive(Debug, Clone)]
pub struct FundingConfig {
    /// Minimum SUI gas balance before a WAL→SUI top-up (MIST)
    pub gas_topup_threshold_mist: u64,
    /// Minimum WAL balance before a SUI→WAL top-up
    pub wal_topup_threshold: u64,
    /// Amount converted per top-up (MIST)
    pub exchange_amount_mist: u64,
    pub exchange_package_id: sui_types::Address,
    pub exchange_object_id: sui_types::Address,
    pub wal_coin_type: String,
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

impl FundingConfig {
    pub fn from_env() -> Result<Self> {
        let exchange_package_id = sui_types::Address::from_str(
            &env::var("WAL_EXCHANGE_PACKAGE_ID")
                .context("WAL_EXCHANGE_PACKAGE_ID environment variable must be set")?,
        )
        .context("Invalid WAL_EXCHANGE_PACKAGE_ID address format")?;

        let exchange_object_id = sui_types::Address::from_str(
            &env::var("WAL_EXCHANGE_OBJECT_ID")
                .context("WAL_EXCHANGE_OBJECT_ID environment variable must be set")?,
        )
        .context("Invalid WAL_EXCHANGE_OBJECT_ID address format")?;

        Ok(Self {
            gas_topup_threshold_mist: env_u64("GAS_TOPUP_THRESHOLD_MIST", 200_000_000),
            wal_topup_threshold: env_u64("WAL_TOPUP_THRESHOLD", 500_000_000),
            exchange_amount_mist: env_u64("EXCHANGE_AMOUNT_MIST", 500_000_000),
            exchange_package_id,
            exchange_object_id,
            wal_coin_type: env::var("WAL_COIN_TYPE")
                .unwrap_or_else(|_| DEFAULT_WAL_COIN_TYPE.to_string()),
        })
    }
}

/// The backend signer viewed as a storage-funding resource.
///
/// `ensure_funded` serializes all balance-check-then-exchange sequences
/// behind one async mutex, so concurrent requests can not both observe
/// a low balance and double-spend the top-up.
pub struct FundedSigner {
    config: FundingConfig,
    lock: Mutex<()>,
}

impl FundedSigner {
    pub fn new(config: FundingConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(FundingConfig::from_env()?))
    }

    pub fn config(&self) -> &FundingConfig {
        &self.config
    }

    /// Idempotent funding check: top up SUI gas from WAL when below the
    /// gas threshold, then top up WAL from SUI when below the WAL
    /// threshold. Both checks run under the signer's lock.
    pub async fn ensure_funded(&self) -> std::result::Result<(), WalrusError> {
        let _guard = self.lock.lock().await;

        let shared_state = SharedSuiState::get_instance();
        let sender = shared_state.get_sui_address_required();
        let mut client = shared_state.get_sui_client();

        let sui_balance = total_balance_mist(&mut client, sender)
            .await
            .map_err(|e| WalrusError::Network(format!("Failed to read SUI balance: {}", e)))?;
        debug!(
            "Funding check for {}: SUI balance {} MIST (threshold {})",
            sender, sui_balance, self.config.gas_topup_threshold_mist
        );

        if sui_balance < self.config.gas_topup_threshold_mist {
            info!(
                "SUI gas balance {} MIST below threshold {} MIST, exchanging WAL for SUI",
                sui_balance, self.config.gas_topup_threshold_mist
            );
            self.exchange_wal_for_sui_locked().await?;
        }

        let wal_balance = get_wal_balance(&mut client, sender, &self.config.wal_coin_type)
            .await
            .map_err(|e| WalrusError::Network(format!("Failed to read WAL balance: {}", e)))?;
        debug!(
            "Funding check for {}: WAL balance {} (threshold {})",
            sender, wal_balance, self.config.wal_topup_threshold
        );

        if wal_balance < self.config.wal_topup_threshold {
            info!(
                "WAL balance {} below threshold {}, exchanging SUI for WAL",
                wal_balance, self.config.wal_topup_threshold
            );
            self.exchange_sui_for_wal_locked(self.config.exchange_amount_mist)
                .await?;
        }

        Ok(())
    }

    /// Exchange `amount_mist` of SUI for WAL, returning the transaction
    /// digest. Public entry point for the explicit REST endpoint; takes
    /// the signer lock.
    pub async fn exchange_sui_for_wal(
        &self,
        amount_mist: u64,
    ) -> std::result::Result<String, WalrusError> {
        let _guard = self.lock.lock().await;
        self.exchange_sui_for_wal_locked(amount_mist).await
    }

    async fn exchange_sui_for_wal_locked(
        &self,
        amount_mist: u64,
    ) -> std::result::Result<String, WalrusError> {
        let sender = SharedSuiState::get_instance().get_sui_address_required();

        let result = execute_move_call(
            self.config.exchange_package_id,
            EXCHANGE_MODULE,
            EXCHANGE_FOR_WAL_FUNCTION,
            vec![(self.config.exchange_object_id, true)],
            None,
            true, // the call returns a Coin<WAL>; send it back to the signer
            move |tb, mut object_args| {
                let amount_arg = tb.input(sui_transaction_builder::Serialized(&amount_mist));
                let gas = tb.gas();
                let sui_coin = tb.split_coins(gas, vec![amount_arg]);
                object_args.push(sui_coin);
                object_args
            },
        )
        .await
        .map_err(|e| WalrusError::TransactionBuild(format!("SUI→WAL exchange failed: {}", e)))?;

        info!(
            "Exchanged {} MIST of SUI for WAL for {}, tx: {}",
            amount_mist, sender, result.digest
        );
        Ok(result.digest)
    }

    async fn exchange_wal_for_sui_locked(&self) -> std::result::Result<(), WalrusError> {
        let shared_state = SharedSuiState::get_instance();
        let sender = shared_state.get_sui_address_required();
        let mut client = shared_state.get_sui_client();

        // exchange_all consumes a whole coin; pick the largest WAL coin
        let mut wal_coins = list_coins_by_type(&mut client, sender, &self.config.wal_coin_type)
            .await
            .map_err(|e| WalrusError::Network(format!("Failed to list WAL coins: {}", e)))?;
        wal_coins.sort_by(|a, b| b.balance.cmp(&a.balance));

        let Some(wal_coin) = wal_coins.into_iter().next() else {
            warn!("No WAL coins available to exchange for SUI gas");
            return Err(WalrusError::InsufficientBalance(
                "no WAL coins available for WAL→SUI exchange".into(),
            ));
        };

        let result = execute_move_call(
            self.config.exchange_package_id,
            EXCHANGE_MODULE,
            EXCHANGE_FOR_SUI_FUNCTION,
            vec![
                (self.config.exchange_object_id, true),
                (wal_coin.object_id(), false),
            ],
            None,
            true, // the call returns a Coin<SUI>; send it back to the signer
            |tb, object_args| {
                let _ = tb;
                object_args
            },
        )
        .await
        .map_err(|e| WalrusError::TransactionBuild(format!("WAL→SUI exchange failed: {}", e)))?;

        info!(
            "Exchanged WAL coin {} for SUI for {}, tx: {}",
            wal_coin.object_id(),
            sender,
            result.digest
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_u64_falls_back_to_default() {
        assert_eq!(env_u64("FUNDING_TEST_UNSET_VAR", 42), 42);
    }

    #[test]
    fn default_wal_coin_type_is_a_coin_type() {
        assert!(DEFAULT_WAL_COIN_TYPE.starts_with("0x2::coin::Coin<"));
        assert!(DEFAULT_WAL_COIN_TYPE.ends_with("::wal::WAL>"));
    }
}

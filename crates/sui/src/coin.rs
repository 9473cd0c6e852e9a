use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sui_rpc::Client as GrpcClient;
use sui_rpc::field::{FieldMask, FieldMaskUtil};
use sui_rpc::proto::sui::rpc::v2 as proto;
use sui_sdk_types as sui;
use tracing::debug;

use crate::constants::{COIN_LOCK_TIMEOUT_SECS, SUI_COIN_TYPE};

const MAX_RETRIES: u32 = 6;
const RETRY_DELAY_MS: u64 = 500;

/// RAII-style guard returned by `try_lock_coin`.
/// When this guard is dropped, the coin lock is automatically released.
pub struct CoinLockGuard {
    manager: CoinLockManager,
    coin_id: sui::Address,
}

impl CoinLockGuard {
    /// Get the coin ID that this guard is locking
    pub fn coin_id(&self) -> sui::Address {
        self.coin_id
    }
}

impl Drop for CoinLockGuard {
    fn drop(&mut self) {
        self.manager.release_coin(self.coin_id);
    }
}

/// Coin lock manager to prevent concurrent usage of the same gas coin
#[derive(Clone)]
pub struct CoinLockManager {
    locks: Arc<Mutex<HashMap<sui::Address, Instant>>>,
    lock_timeout: Duration,
}

impl CoinLockManager {
    pub fn new(lock_timeout_seconds: u64) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout: Duration::from_secs(lock_timeout_seconds),
        }
    }

    /// Attempts to lock a coin for exclusive use.
    /// Returns `Some(CoinLockGuard)` if the coin was successfully locked; `None` otherwise.
    pub fn try_lock_coin(&self, coin_id: sui::Address) -> Option<CoinLockGuard> {
        let mut locks = self.locks.lock();

        // Clean up expired locks first
        let now = Instant::now();
        locks.retain(|_, lock_time| now.duration_since(*lock_time) < self.lock_timeout);

        use std::collections::hash_map::Entry;
        match locks.entry(coin_id) {
            Entry::Occupied(_) => None, // already locked
            Entry::Vacant(entry) => {
                entry.insert(now);
                Some(CoinLockGuard {
                    manager: self.clone(),
                    coin_id,
                })
            }
        }
    }

    /// Releases a coin lock
    fn release_coin(&self, coin_id: sui::Address) {
        let mut locks = self.locks.lock();
        locks.remove(&coin_id);
    }

    /// Checks if a coin is currently locked
    pub fn is_locked(&self, coin_id: sui::Address) -> bool {
        let mut locks = self.locks.lock();

        let now = Instant::now();
        locks.retain(|_, lock_time| now.duration_since(*lock_time) < self.lock_timeout);

        locks.contains_key(&coin_id)
    }
}

/// Global coin lock manager instance
static COIN_LOCK_MANAGER: std::sync::OnceLock<CoinLockManager> = std::sync::OnceLock::new();

pub fn get_coin_lock_manager() -> &'static CoinLockManager {
    COIN_LOCK_MANAGER.get_or_init(|| CoinLockManager::new(COIN_LOCK_TIMEOUT_SECS))
}

#[derive(Debug, Clone)]
pub struct CoinInfo {
    pub object_ref: sui::ObjectReference,
    pub balance: u64,
}

impl CoinInfo {
    pub fn object_id(&self) -> sui::Address {
        *self.object_ref.object_id()
    }
}

/// Fetches a SUI coin with sufficient balance and locks it for exclusive use
pub async fn fetch_coin(
    client: &mut GrpcClient,
    sender: sui::Address,
    min_balance: u64,
) -> Result<Option<(CoinInfo, CoinLockGuard)>> {
    let lock_manager = get_coin_lock_manager();

    for attempt in 1..=MAX_RETRIES {
        let coins = list_coins_by_type(client, sender, SUI_COIN_TYPE).await?;

        debug!(
            "Attempt {}/{}: Found {} SUI coins for address {}",
            attempt,
            MAX_RETRIES,
            coins.len(),
            sender
        );

        // Collect all suitable coins first, then try to lock them
        let mut suitable_coins: Vec<CoinInfo> = coins
            .into_iter()
            .filter(|c| c.balance >= min_balance)
            .collect();

        // Sort by balance ascending to prefer smaller coins first
        suitable_coins.sort_by(|a, b| a.balance.cmp(&b.balance));

        if suitable_coins.is_empty() {
            debug!(
                "No coins with sufficient balance found. Need at least {} MIST ({:.4} SUI)",
                min_balance,
                min_balance as f64 / 1_000_000_000.0
            );
        }

        let mut locked_count = 0;
        for coin in suitable_coins {
            if let Some(guard) = lock_manager.try_lock_coin(coin.object_id()) {
                debug!(
                    "Successfully locked coin {} with balance {} MIST",
                    coin.object_id(),
                    coin.balance
                );
                return Ok(Some((coin, guard)));
            } else {
                locked_count += 1;
            }
        }

        if locked_count > 0 {
            debug!(
                "All {} suitable coins are currently locked, will retry",
                locked_count
            );
        }

        if attempt < MAX_RETRIES {
            let delay = RETRY_DELAY_MS * (attempt as u64);
            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
        }
    }

    debug!(
        "No unlocked coins found with sufficient balance after {} attempts (min_balance: {} MIST)",
        MAX_RETRIES, min_balance
    );
    Ok(None)
}

/// Extracts coin balance from BCS contents.
/// Coin<T> has layout: { id: UID, balance: Balance<T> }
/// Balance<T> has layout: { value: u64 }
/// Skip the UID (32 bytes) and read the balance u64.
fn extract_coin_balance_from_contents(contents: &[u8]) -> Result<u64> {
    if contents.len() >= 40 {
        let balance_bytes = &contents[32..40];
        let balance = u64::from_le_bytes(balance_bytes.try_into().unwrap_or([0; 8]));
        Ok(balance)
    } else {
        Ok(0)
    }
}

/// Gets the balance of a specific coin object via get_object RPC
async fn get_coin_balance_via_get_object(
    client: &mut GrpcClient,
    object_ref: &sui::ObjectReference,
) -> Result<u64> {
    let mut ledger = client.ledger_client();

    let mut request = proto::GetObjectRequest::default();
    request.object_id = Some(object_ref.object_id().to_string());
    request.version = Some(object_ref.version());
    request.read_mask = Some(FieldMask::from_paths(["contents"]));

    let resp = ledger.get_object(request).await?.into_inner();

    if let Some(obj) = resp.object {
        if let Some(contents) = obj.contents {
            if let Some(value) = contents.value {
                return extract_coin_balance_from_contents(&value);
            }
        }
    }

    Ok(0)
}

/// Lists owned coins of a given coin object type with their balances
pub async fn list_coins_by_type(
    client: &mut GrpcClient,
    owner: sui::Address,
    coin_type: &str,
) -> Result<Vec<CoinInfo>> {
    let mut state = client.state_client();

    let mut request = proto::ListOwnedObjectsRequest::default();
    request.owner = Some(owner.to_string());
    request.page_size = Some(100);
    request.page_token = None;
    request.read_mask = Some(FieldMask::from_paths([
        "object_id",
        "version",
        "digest",
        "object_type",
        "contents",
    ]));
    request.object_type = Some(coin_type.to_string());

    let resp = state.list_owned_objects(request).await?.into_inner();

    let mut coins = Vec::new();

    for obj in resp.objects {
        if let (Some(id_str), Some(version), Some(digest_str)) =
            (&obj.object_id, obj.version, &obj.digest)
        {
            let object_id = sui::Address::from_str(id_str)?;
            let digest = sui::Digest::from_base58(digest_str)?;
            let object_ref = sui::ObjectReference::new(object_id, version, digest);

            let balance = if let Some(contents) = &obj.contents {
                if let Some(value) = &contents.value {
                    extract_coin_balance_from_contents(value)?
                } else {
                    get_coin_balance_via_get_object(client, &object_ref).await?
                }
            } else {
                get_coin_balance_via_get_object(client, &object_ref).await?
            };

            coins.push(CoinInfo {
                object_ref,
                balance,
            });
        }
    }

    Ok(coins)
}

/// Lists all SUI coins owned by `owner` with their balances
pub async fn list_coins(client: &mut GrpcClient, owner: sui::Address) -> Result<Vec<CoinInfo>> {
    list_coins_by_type(client, owner, SUI_COIN_TYPE).await
}

/// Total SUI balance in MIST for `owner`
pub async fn total_balance_mist(client: &mut GrpcClient, owner: sui::Address) -> Result<u64> {
    let coins = list_coins(client, owner).await?;
    Ok(coins.iter().map(|c| c.balance).sum())
}

/// Total WAL balance for `owner`. `wal_coin_type` is the full coin
/// object type, e.g. `0x2::coin::Coin<0x…::wal::WAL>`.
pub async fn get_wal_balance(
    client: &mut GrpcClient,
    owner: sui::Address,
    wal_coin_type: &str,
) -> Result<u64> {
    let coins = list_coins_by_type(client, owner, wal_coin_type).await?;
    Ok(coins.iter().map(|c| c.balance).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> sui::Address {
        sui::Address::new([byte; 32])
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let manager = CoinLockManager::new(60);
        let coin = addr(1);

        let guard = manager.try_lock_coin(coin).expect("first lock succeeds");
        assert!(manager.try_lock_coin(coin).is_none());
        assert!(manager.is_locked(coin));

        drop(guard);
        assert!(!manager.is_locked(coin));
        assert!(manager.try_lock_coin(coin).is_some());
    }

    #[test]
    fn expired_locks_are_reaped() {
        let manager = CoinLockManager::new(0);
        let coin = addr(2);

        let _guard = manager.try_lock_coin(coin).expect("first lock succeeds");
        // Zero timeout: the lock is already expired for the next taker
        assert!(manager.try_lock_coin(coin).is_some());
    }

    #[test]
    fn balance_extraction_reads_u64_after_uid() {
        let mut contents = vec![0u8; 32];
        contents.extend_from_slice(&42u64.to_le_bytes());
        assert_eq!(extract_coin_balance_from_contents(&contents).unwrap(), 42);

        // Truncated contents degrade to zero
        assert_eq!(extract_coin_balance_from_contents(&[0u8; 10]).unwrap(), 0);
    }
}

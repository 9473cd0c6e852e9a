// Module declarations
pub mod chain;
pub mod coin;
pub mod constants;
pub mod error;
pub mod keypair;
pub mod object_types;
pub mod state;
pub mod transactions;

// Re-export commonly used types
pub use chain::{
    derive_address_from_secret_key, get_reference_gas_price, load_sender_from_env,
    pick_gas_object, resolve_rpc_url,
};
pub use coin::{
    CoinInfo, CoinLockGuard, CoinLockManager, fetch_coin, get_coin_lock_manager, get_wal_balance,
    list_coins, list_coins_by_type, total_balance_mist,
};
pub use error::SuiInterfaceError;
pub use keypair::{
    FlaggedPublicKey, KeyError, bcs_serialize, sign_personal_message, verify_personal_message,
};
pub use object_types::{ExpectedObjectType, find_created_object};
pub use state::SharedSuiState;
pub use transactions::{
    MintTaleParams, TransactionBlockResult, build_tale_mint_tx, check_effects_success,
    execute_move_call, fetch_transaction, serialize_transaction,
};

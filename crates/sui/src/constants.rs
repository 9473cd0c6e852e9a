// Gas budget configuration
// 1 SUI = 1,000,000,000 MIST

/// Maximum gas budget allowed for the dry-run simulation (5 SUI)
pub const SIMULATION_GAS_BUDGET_MIST: u64 = 5_000_000_000;

/// Minimum gas budget for any transaction (0.005 SUI)
pub const MIN_GAS_BUDGET_MIST: u64 = 5_000_000;

/// Maximum gas budget for any transaction (0.5 SUI)
pub const MAX_GAS_BUDGET_MIST: u64 = 500_000_000;

/// Fallback gas budget when simulation fails or no custom budget provided (0.1 SUI)
pub const FALLBACK_GAS_BUDGET_MIST: u64 = 100_000_000;

pub const MIST_PER_SUI: u64 = 1_000_000_000;

// Coin locking configuration

/// Timeout for gas coin locks (in seconds).
pub const COIN_LOCK_TIMEOUT_SECS: u64 = 60;

/// Object type filter for SUI gas coins
pub const SUI_COIN_TYPE: &str = "0x2::coin::Coin<0x2::sui::SUI>";

// Tale mint defaults, applied when the publication request omits them

/// Default mint price (0.1 SUI)
pub const DEFAULT_MINT_PRICE_MIST: u64 = 100_000_000;

/// Default mint capacity (number of purchasable copies)
pub const DEFAULT_MINT_CAPACITY: u64 = 100;

/// Default royalty in basis points (5%)
pub const DEFAULT_ROYALTY_BPS: u16 = 500;

// Move call targets within the tales package

pub const TALES_MODULE: &str = "tales";
pub const MINT_TALE_FUNCTION: &str = "mint_tale";
pub const TALE_STRUCT: &str = "Tale";

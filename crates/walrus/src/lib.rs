pub mod client;
pub mod error;
pub mod funding;

pub use client::{Daemon, ReadBlobParams, StoreBlobParams, WalrusClient, WalrusConfig};
pub use error::WalrusError;
pub use funding::{FundedSigner, FundingConfig};

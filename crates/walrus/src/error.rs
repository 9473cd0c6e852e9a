use thiserror::Error;

/// Walrus failure taxonomy. Each variant maps to the HTTP status
/// class the REST boundary reports for it.
#[derive(Error, Debug)]
pub enum WalrusError {
    #[error("Failed to encode blob content: {0}")]
    Encoding(String),

    #[error("Failed to compute storage cost: {0}")]
    StorageCost(String),

    #[error("Failed to build storage transaction: {0}")]
    TransactionBuild(String),

    #[error("Storage transaction dry run failed: {0}")]
    DryRun(String),

    #[error("Walrus network request failed: {0}")]
    Network(String),

    #[error("Insufficient balance for storage operation: {0}")]
    InsufficientBalance(String),

    #[error("Failed to retrieve blob {blob_id}: {message}")]
    BlobRetrieval { blob_id: String, message: String },

    #[error("Walrus configuration error: {0}")]
    Configuration(String),
}

impl WalrusError {
    /// The HTTP status code class this error surfaces as
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InsufficientBalance(_) => 402,
            Self::Network(_) => 503,
            Self::BlobRetrieval { .. } => 404,
            Self::Configuration(_) => 500,
            Self::Encoding(_) | Self::StorageCost(_) | Self::TransactionBuild(_) | Self::DryRun(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, WalrusError>;

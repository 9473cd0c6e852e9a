use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuiInterfaceError {
    #[error("RPC connection failed: {0}")]
    RpcConnectionError(String),

    #[error("Transaction failed: {message}{}", tx_digest.as_ref().map(|d| format!(" (tx: {})", d)).unwrap_or_default())]
    TransactionError {
        message: String,
        tx_digest: Option<String>,
    },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Sui SDK error: {0}")]
    SuiSdkError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SuiInterfaceError>;

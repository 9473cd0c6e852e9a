use sui::{KeyError, SuiInterfaceError};
use thiserror::Error;
use walrus::WalrusError;

/// Service-level failure taxonomy. Every variant maps to one HTTP
/// status class at the REST boundary.
#[derive(Error, Debug)]
pub enum TaleError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("On-chain transaction failed: {0}")]
    OnChainFailure(String),

    #[error(transparent)]
    Walrus(#[from] WalrusError),

    #[error("Sui interface error: {0}")]
    Sui(#[from] SuiInterfaceError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    Internal(String),
}

impl TaleError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::OnChainFailure(_) => 417,
            Self::Walrus(e) => e.status_code(),
            Self::Sui(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<KeyError> for TaleError {
    fn from(err: KeyError) -> Self {
        match err {
            // A signature that parsed but does not authenticate is an
            // authorization failure; everything else is malformed input
            KeyError::VerificationFailed(_) => Self::Unauthorized(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(TaleError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(TaleError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(TaleError::NotFound("x".into()).status_code(), 404);
        assert_eq!(TaleError::OnChainFailure("x".into()).status_code(), 417);
        assert_eq!(
            TaleError::from(WalrusError::InsufficientBalance("x".into())).status_code(),
            402
        );
        assert_eq!(
            TaleError::from(WalrusError::Network("x".into())).status_code(),
            503
        );
        assert_eq!(TaleError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn key_errors_split_into_400_and_401() {
        assert_eq!(
            TaleError::from(KeyError::UnsupportedScheme(0x05)).status_code(),
            400
        );
        assert_eq!(
            TaleError::from(KeyError::VerificationFailed("bad".into())).status_code(),
            401
        );
    }
}

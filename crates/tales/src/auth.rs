use std::str::FromStr;

use sui::{FlaggedPublicKey, verify_personal_message};
use sui_sdk_types as sui_types;
use tracing::{debug, warn};

use crate::error::TaleError;

/// The signed fields of a publication request
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Wallet address the caller claims to own
    pub user_address: String,
    /// Base64 combined Sui signature
    pub signature: String,
    /// Base64 flagged public key (`flag || raw key bytes`)
    pub public_key: String,
    /// Tale title, bound into the signed message
    pub title: String,
}

/// Deterministic reconstruction of the message the wallet signed
pub fn authorization_message(address: &str, title: &str) -> String {
    format!(
        "SuiTale content upload authorization for user {}. Title: {}",
        address, title
    )
}

/// The §4.1-style validation gate: reconstruct the key, require the
/// derived address to equal the claimed one, then verify the
/// signature over the reconstructed authorization message.
///
/// Pure validation: no side effects besides logging, no retries.
/// Returns the verified author address.
pub fn verify_upload_authorization(
    request: &AuthorizationRequest,
) -> Result<sui_types::Address, TaleError> {
    let public_key = FlaggedPublicKey::from_base64(&request.public_key)?;

    let claimed_address = sui_types::Address::from_str(&request.user_address).map_err(|e| {
        TaleError::BadRequest(format!(
            "Invalid user address '{}': {}",
            request.user_address, e
        ))
    })?;

    let derived_address = public_key.derive_address();
    if derived_address != claimed_address {
        warn!(
            "Address mismatch: derived {} does not equal claimed {}",
            derived_address, claimed_address
        );
        return Err(TaleError::Unauthorized(format!(
            "public key does not belong to address {}",
            request.user_address
        )));
    }

    let message = authorization_message(&request.user_address, &request.title);
    verify_personal_message(&public_key, message.as_bytes(), &request.signature)?;

    debug!(
        "Upload authorization verified for {} ({})",
        derived_address,
        public_key.scheme_name()
    );
    Ok(derived_address)
}

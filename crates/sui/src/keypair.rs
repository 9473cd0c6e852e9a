use std::borrow::Cow;
use std::str::FromStr;

use anyhow::Result;
use sui_crypto::SuiSigner;
use sui_crypto::SuiVerifier;
use sui_crypto::ed25519::{Ed25519PrivateKey, Ed25519VerifyingKey};
use sui_crypto::secp256k1::Secp256k1VerifyingKey;
use sui_sdk_types as sui;
use thiserror::Error;
use tracing::debug;

/// Scheme flag prepended to Ed25519 public keys and signatures
pub const ED25519_FLAG: u8 = 0x00;
/// Scheme flag prepended to Secp256k1 public keys and signatures
pub const SECP256K1_FLAG: u8 = 0x01;

const ED25519_KEY_LEN: usize = 32;
const SECP256K1_KEY_LEN: usize = 33;

/// Errors produced while reconstructing wallet keys or verifying
/// wallet signatures. `UnsupportedScheme`, `InvalidKeyLength`,
/// `MalformedSignature` and `SchemeMismatch` are malformed-input
/// failures; `VerificationFailed` means the input parsed but the
/// signature does not authenticate the claimed signer.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("public key is not valid base64")]
    InvalidEncoding,

    #[error("public key is empty")]
    EmptyKey,

    #[error("unsupported key scheme flag 0x{0:02x}")]
    UnsupportedScheme(u8),

    #[error("{scheme} public key must be {expected} bytes, got {actual}")]
    InvalidKeyLength {
        scheme: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("signature is not a valid Sui signature: {0}")]
    MalformedSignature(String),

    #[error("multisig, zklogin and passkey signatures are not supported")]
    UnsupportedSignature,

    #[error("signature scheme flag 0x{signature:02x} does not match public key flag 0x{key:02x}")]
    SchemeMismatch { key: u8, signature: u8 },

    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
}

/// A wallet public key reconstructed from its flagged byte encoding
/// (`flag || raw key bytes`), as serialized by Sui wallets.
#[derive(Debug, Clone)]
pub enum FlaggedPublicKey {
    Ed25519(sui::Ed25519PublicKey),
    Secp256k1(sui::Secp256k1PublicKey),
}

impl FlaggedPublicKey {
    /// Decode a base64 `flag || key` public key. Only Ed25519 (0x00, 32
    /// key bytes) and Secp256k1 (0x01, 33 key bytes) are accepted.
    pub fn from_base64(encoded: &str) -> std::result::Result<Self, KeyError> {
        use base64ct::Encoding;

        let bytes = base64ct::Base64::decode_vec(encoded).map_err(|_| KeyError::InvalidEncoding)?;
        let (flag, key_bytes) = bytes.split_first().ok_or(KeyError::EmptyKey)?;

        match *flag {
            ED25519_FLAG => {
                let arr: [u8; ED25519_KEY_LEN] =
                    key_bytes
                        .try_into()
                        .map_err(|_| KeyError::InvalidKeyLength {
                            scheme: "ed25519",
                            expected: ED25519_KEY_LEN,
                            actual: key_bytes.len(),
                        })?;
                Ok(Self::Ed25519(sui::Ed25519PublicKey::new(arr)))
            }
            SECP256K1_FLAG => {
                let arr: [u8; SECP256K1_KEY_LEN] =
                    key_bytes
                        .try_into()
                        .map_err(|_| KeyError::InvalidKeyLength {
                            scheme: "secp256k1",
                            expected: SECP256K1_KEY_LEN,
                            actual: key_bytes.len(),
                        })?;
                Ok(Self::Secp256k1(sui::Secp256k1PublicKey::new(arr)))
            }
            other => Err(KeyError::UnsupportedScheme(other)),
        }
    }

    /// Derive the Sui address owned by this key
    pub fn derive_address(&self) -> sui::Address {
        match self {
            Self::Ed25519(pk) => pk.derive_address(),
            Self::Secp256k1(pk) => pk.derive_address(),
        }
    }

    pub fn flag(&self) -> u8 {
        match self {
            Self::Ed25519(_) => ED25519_FLAG,
            Self::Secp256k1(_) => SECP256K1_FLAG,
        }
    }

    pub fn scheme_name(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => "ed25519",
            Self::Secp256k1(_) => "secp256k1",
        }
    }
}

fn simple_signature_flag(signature: &sui::SimpleSignature) -> u8 {
    match signature {
        sui::SimpleSignature::Ed25519 { .. } => ED25519_FLAG,
        sui::SimpleSignature::Secp256k1 { .. } => SECP256K1_FLAG,
        sui::SimpleSignature::Secp256r1 { .. } => 0x02,
    }
}

/// Verify a base64 wallet signature over `message` bytes, signed with
/// the Sui personal-message intent.
///
/// The scheme flag embedded in the signature must match the public
/// key's flag; a mismatch is a malformed request, not an
/// authentication failure.
pub fn verify_personal_message(
    public_key: &FlaggedPublicKey,
    message: &[u8],
    signature_b64: &str,
) -> std::result::Result<(), KeyError> {
    let signature = sui::UserSignature::from_base64(signature_b64)
        .map_err(|e| KeyError::MalformedSignature(e.to_string()))?;

    let simple = match &signature {
        sui::UserSignature::Simple(simple) => simple,
        _ => return Err(KeyError::UnsupportedSignature),
    };

    let signature_flag = simple_signature_flag(simple);
    if signature_flag != public_key.flag() {
        return Err(KeyError::SchemeMismatch {
            key: public_key.flag(),
            signature: signature_flag,
        });
    }

    let personal_message = sui::PersonalMessage(Cow::Borrowed(message));

    let verified = match public_key {
        FlaggedPublicKey::Ed25519(pk) => Ed25519VerifyingKey::new(pk)
            .map_err(|e| KeyError::VerificationFailed(e.to_string()))?
            .verify_personal_message(&personal_message, &signature),
        FlaggedPublicKey::Secp256k1(pk) => Secp256k1VerifyingKey::new(pk)
            .map_err(|e| KeyError::VerificationFailed(e.to_string()))?
            .verify_personal_message(&personal_message, &signature),
    };

    verified.map_err(|e| {
        debug!("Personal message verification failed: {}", e);
        KeyError::VerificationFailed(e.to_string())
    })
}

/// Sign `message` bytes with the Sui personal-message intent
pub fn sign_personal_message(
    private_key: &Ed25519PrivateKey,
    message: &[u8],
) -> Result<sui::UserSignature> {
    let personal_message = sui::PersonalMessage(Cow::Borrowed(message));
    private_key
        .sign_personal_message(&personal_message)
        .map_err(|e| anyhow::anyhow!("Failed to sign personal message: {}", e))
}

/// BCS-serialize a value into bytes
pub fn bcs_serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bcs::to_bytes(value).map_err(|e| anyhow::anyhow!("BCS serialization failed: {}", e))
}

/// Parse an address string, requiring the canonical 0x-prefixed form
pub fn parse_address(address: &str) -> Result<sui::Address> {
    sui::Address::from_str(address).map_err(|e| anyhow::anyhow!("Invalid address format: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::Encoding;

    fn test_key() -> Ed25519PrivateKey {
        Ed25519PrivateKey::new([7u8; 32])
    }

    fn flagged_base64(flag: u8, key_bytes: &[u8]) -> String {
        let mut bytes = vec![flag];
        bytes.extend_from_slice(key_bytes);
        base64ct::Base64::encode_string(&bytes)
    }

    #[test]
    fn decodes_valid_ed25519_key() {
        let pk = test_key().public_key();
        let encoded = flagged_base64(ED25519_FLAG, pk.inner());
        let decoded = FlaggedPublicKey::from_base64(&encoded).unwrap();
        assert_eq!(decoded.flag(), ED25519_FLAG);
        assert_eq!(decoded.derive_address(), pk.derive_address());
    }

    #[test]
    fn decodes_valid_secp256k1_key_length() {
        // 33 arbitrary bytes are enough for length/flag validation
        let encoded = flagged_base64(SECP256K1_FLAG, &[2u8; 33]);
        let decoded = FlaggedPublicKey::from_base64(&encoded).unwrap();
        assert_eq!(decoded.flag(), SECP256K1_FLAG);
        assert_eq!(decoded.scheme_name(), "secp256k1");
    }

    #[test]
    fn rejects_unknown_scheme_flags() {
        for flag in [0x02u8, 0x03, 0x05, 0xff] {
            let encoded = flagged_base64(flag, &[0u8; 32]);
            match FlaggedPublicKey::from_base64(&encoded) {
                Err(KeyError::UnsupportedScheme(f)) => assert_eq!(f, flag),
                other => panic!("expected UnsupportedScheme, got {:?}", other),
            }
        }
    }

    #[test]
    fn rejects_wrong_key_lengths() {
        for len in [0usize, 16, 31, 33, 64] {
            let encoded = flagged_base64(ED25519_FLAG, &vec![1u8; len]);
            assert!(matches!(
                FlaggedPublicKey::from_base64(&encoded),
                Err(KeyError::InvalidKeyLength { .. })
            ));
        }
        for len in [0usize, 32, 34, 65] {
            let encoded = flagged_base64(SECP256K1_FLAG, &vec![1u8; len]);
            assert!(matches!(
                FlaggedPublicKey::from_base64(&encoded),
                Err(KeyError::InvalidKeyLength { .. })
            ));
        }
    }

    #[test]
    fn rejects_garbage_base64() {
        assert!(matches!(
            FlaggedPublicKey::from_base64("not-base64!!"),
            Err(KeyError::InvalidEncoding)
        ));
        assert!(matches!(
            FlaggedPublicKey::from_base64(""),
            Err(KeyError::EmptyKey)
        ));
    }

    #[test]
    fn verifies_signed_personal_message() {
        let sk = test_key();
        let message = b"SuiTale content upload authorization for user 0xabc. Title: My Tale";
        let signature = sign_personal_message(&sk, message).unwrap();

        let pk = sk.public_key();
        let key = FlaggedPublicKey::from_base64(&flagged_base64(ED25519_FLAG, pk.inner())).unwrap();

        verify_personal_message(&key, message, &signature.to_base64()).unwrap();
    }

    #[test]
    fn rejects_signature_over_different_message() {
        let sk = test_key();
        let signature = sign_personal_message(&sk, b"original message").unwrap();

        let pk = sk.public_key();
        let key = FlaggedPublicKey::from_base64(&flagged_base64(ED25519_FLAG, pk.inner())).unwrap();

        assert!(matches!(
            verify_personal_message(&key, b"tampered message", &signature.to_base64()),
            Err(KeyError::VerificationFailed(_))
        ));
    }

    #[test]
    fn rejects_signature_from_different_key() {
        let signer = Ed25519PrivateKey::new([9u8; 32]);
        let message = b"shared message";
        let signature = sign_personal_message(&signer, message).unwrap();

        let other_pk = test_key().public_key();
        let key =
            FlaggedPublicKey::from_base64(&flagged_base64(ED25519_FLAG, other_pk.inner())).unwrap();

        assert!(matches!(
            verify_personal_message(&key, message, &signature.to_base64()),
            Err(KeyError::VerificationFailed(_))
        ));
    }

    #[test]
    fn rejects_scheme_mismatch_between_key_and_signature() {
        let sk = test_key();
        let message = b"message";
        let signature = sign_personal_message(&sk, message).unwrap();

        // Secp256k1-flagged key paired with an ed25519 signature
        let key = FlaggedPublicKey::from_base64(&flagged_base64(SECP256K1_FLAG, &[2u8; 33])).unwrap();

        assert!(matches!(
            verify_personal_message(&key, message, &signature.to_base64()),
            Err(KeyError::SchemeMismatch {
                key: SECP256K1_FLAG,
                signature: ED25519_FLAG,
            })
        ));
    }

    #[test]
    fn rejects_malformed_signature_bytes() {
        let pk = test_key().public_key();
        let key = FlaggedPublicKey::from_base64(&flagged_base64(ED25519_FLAG, pk.inner())).unwrap();

        assert!(matches!(
            verify_personal_message(&key, b"message", "@@@not base64@@@"),
            Err(KeyError::MalformedSignature(_))
        ));
    }
}

use base64ct::Encoding;
use sui_crypto::ed25519::Ed25519PrivateKey;
use tales::{AuthorizationRequest, TaleError, authorization_message, verify_upload_authorization};

fn flagged_public_key_b64(sk: &Ed25519PrivateKey) -> String {
    let pk = sk.public_key();
    let mut bytes = vec![0x00u8];
    bytes.extend_from_slice(pk.inner());
    base64ct::Base64::encode_string(&bytes)
}

fn signed_request(sk: &Ed25519PrivateKey, claimed_address: &str, title: &str) -> AuthorizationRequest {
    let message = authorization_message(claimed_address, title);
    let signature = sui::sign_personal_message(sk, message.as_bytes())
        .expect("signing cannot fail")
        .to_base64();

    AuthorizationRequest {
        user_address: claimed_address.to_string(),
        signature,
        public_key: flagged_public_key_b64(sk),
        title: title.to_string(),
    }
}

#[test]
fn accepts_valid_authorization() {
    let sk = Ed25519PrivateKey::new([11u8; 32]);
    let address = sk.public_key().derive_address().to_string();

    let request = signed_request(&sk, &address, "My Tale");
    let verified = verify_upload_authorization(&request).expect("authorization is valid");
    assert_eq!(verified.to_string(), address);
}

#[test]
fn rejects_claimed_address_not_matching_key() {
    let sk = Ed25519PrivateKey::new([11u8; 32]);
    let other = Ed25519PrivateKey::new([12u8; 32]);
    let other_address = other.public_key().derive_address().to_string();

    // The signature itself is valid over the message for the claimed
    // address; the derived-address check must still reject it
    let request = signed_request(&sk, &other_address, "My Tale");
    match verify_upload_authorization(&request) {
        Err(TaleError::Unauthorized(_)) => {}
        other => panic!("expected Unauthorized, got {:?}", other.map(|a| a.to_string())),
    }
}

#[test]
fn rejects_signature_over_a_different_title() {
    let sk = Ed25519PrivateKey::new([11u8; 32]);
    let address = sk.public_key().derive_address().to_string();

    let mut request = signed_request(&sk, &address, "Original Title");
    request.title = "Forged Title".to_string();

    match verify_upload_authorization(&request) {
        Err(TaleError::Unauthorized(_)) => {}
        other => panic!("expected Unauthorized, got {:?}", other.map(|a| a.to_string())),
    }
}

#[test]
fn rejects_unknown_key_scheme_as_bad_request() {
    let sk = Ed25519PrivateKey::new([11u8; 32]);
    let address = sk.public_key().derive_address().to_string();

    let mut request = signed_request(&sk, &address, "My Tale");
    let mut bytes = vec![0x05u8];
    bytes.extend_from_slice(&[0u8; 32]);
    request.public_key = base64ct::Base64::encode_string(&bytes);

    match verify_upload_authorization(&request) {
        Err(TaleError::BadRequest(_)) => {}
        other => panic!("expected BadRequest, got {:?}", other.map(|a| a.to_string())),
    }
}

#[test]
fn rejects_truncated_key_as_bad_request() {
    let sk = Ed25519PrivateKey::new([11u8; 32]);
    let address = sk.public_key().derive_address().to_string();

    let mut request = signed_request(&sk, &address, "My Tale");
    let mut bytes = vec![0x00u8];
    bytes.extend_from_slice(&[0u8; 31]);
    request.public_key = base64ct::Base64::encode_string(&bytes);

    match verify_upload_authorization(&request) {
        Err(TaleError::BadRequest(_)) => {}
        other => panic!("expected BadRequest, got {:?}", other.map(|a| a.to_string())),
    }
}

#[test]
fn rejects_malformed_claimed_address() {
    let sk = Ed25519PrivateKey::new([11u8; 32]);
    let request = signed_request(&sk, "not-an-address", "My Tale");

    match verify_upload_authorization(&request) {
        Err(TaleError::BadRequest(_)) => {}
        other => panic!("expected BadRequest, got {:?}", other.map(|a| a.to_string())),
    }
}

#[test]
fn message_reconstruction_is_deterministic() {
    assert_eq!(
        authorization_message("0xabc", "My Tale"),
        "SuiTale content upload authorization for user 0xabc. Title: My Tale"
    );
}

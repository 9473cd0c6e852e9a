use anyhow::{Result, anyhow};
use std::env;
use std::str::FromStr;
use sui_rpc::Client as GrpcClient;
use sui_rpc::proto::sui::rpc::v2 as proto;
use sui_sdk_types as sui;
use tracing::debug;

/// Resolve the RPC URL based on the following priority:
/// 1. If rpc_url is provided explicitly, use it
/// 2. If SUI_RPC_URL env var is set, use it (allows custom endpoints)
/// 3. Otherwise, determine chain and use chain-specific URL:
///    - Use provided chain parameter if Some
///    - Otherwise check SUI_CHAIN env var
///    - Default to "testnet"
///    - Check SUI_RPC_URL_<CHAIN> env var
///    - Fall back to default https://fullnode.<chain>.sui.io:443
pub fn resolve_rpc_url(rpc_url: Option<String>, chain_override: Option<String>) -> Result<String> {
    if let Some(url) = rpc_url {
        return Ok(url);
    }

    if let Ok(custom_url) = env::var("SUI_RPC_URL") {
        return Ok(custom_url);
    }

    let chain = if let Some(chain) = chain_override {
        chain.to_lowercase()
    } else {
        env::var("SUI_CHAIN")
            .unwrap_or_else(|_| "testnet".to_string())
            .to_lowercase()
    };

    match chain.as_str() {
        "devnet" | "testnet" | "mainnet" => {}
        _ => {
            return Err(anyhow!(
                "Invalid chain '{}'. Must be one of: devnet, testnet, mainnet",
                chain
            ));
        }
    }

    let chain_specific_var = format!("SUI_RPC_URL_{}", chain.to_uppercase());
    if let Ok(chain_url) = env::var(&chain_specific_var) {
        return Ok(chain_url);
    }

    Ok(format!("https://fullnode.{}.sui.io:443", chain))
}

/// Derive a Sui address from a 32-byte Ed25519 private key
pub fn derive_address_from_secret_key(secret_key_bytes: &[u8; 32]) -> sui::Address {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(secret_key_bytes);
    let verifying_key = signing_key.verifying_key();
    let mut pk_bytes = [0u8; 32];
    pk_bytes.copy_from_slice(verifying_key.as_bytes());

    let sui_public_key = sui::Ed25519PublicKey::new(pk_bytes);
    sui_public_key.derive_address()
}

/// Load the backend signer address and private key from environment variables
pub fn load_sender_from_env() -> Result<(sui::Address, sui_crypto::ed25519::Ed25519PrivateKey)> {
    load_sender_from_env_or_key(None)
}

/// Load the backend signer address and private key from environment
/// variables or a provided key string. Accepts bech32 `suiprivkey`,
/// base64 (optionally flagged) or hex encodings.
pub fn load_sender_from_env_or_key(
    private_key_opt: Option<String>,
) -> Result<(sui::Address, sui_crypto::ed25519::Ed25519PrivateKey)> {
    use base64ct::Encoding;

    let using_provided_key = private_key_opt.is_some();

    let key_part = if let Some(key) = private_key_opt {
        key
    } else {
        let raw = env::var("SUI_SECRET_KEY")?;
        raw.split_once(':')
            .map(|(_, b)| b.to_string())
            .unwrap_or(raw)
    };

    // Try bech32 "suiprivkey" first
    if key_part.starts_with("suiprivkey") {
        debug!("Decoding SUI_SECRET_KEY as bech32 suiprivkey");
        let (hrp, data, _variant) = bech32::decode(&key_part)?;
        if hrp != "suiprivkey" {
            return Err(anyhow!("invalid bech32 hrp"));
        }
        let bytes: Vec<u8> = bech32::FromBase32::from_base32(&data)?;
        if bytes.len() != 33 {
            return Err(anyhow!("bech32 payload must be 33 bytes (flag || key)"));
        }
        if bytes[0] != 0x00 {
            return Err(anyhow!(
                "unsupported key scheme flag; only ed25519 supported"
            ));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes[1..]);

        let addr = resolve_sender_address(&arr, using_provided_key)?;
        let sk = sui_crypto::ed25519::Ed25519PrivateKey::new(arr);
        return Ok((addr, sk));
    }

    // Else try base64 then hex
    let mut bytes = match base64ct::Base64::decode_vec(&key_part) {
        Ok(v) => v,
        Err(_) => {
            debug!("SUI_SECRET_KEY not base64; trying hex");
            if let Some(hex_str) = key_part.strip_prefix("0x") {
                hex::decode(hex_str)?
            } else {
                hex::decode(&key_part)?
            }
        }
    };

    if !bytes.is_empty() && (bytes[0] == 0x00 || bytes.len() == 33) {
        bytes = bytes[1..].to_vec();
    }

    if bytes.len() < 32 {
        return Err(anyhow!("SUI_SECRET_KEY must contain at least 32 bytes"));
    }

    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes[..32]);

    let addr = resolve_sender_address(&arr, using_provided_key)?;
    let sk = sui_crypto::ed25519::Ed25519PrivateKey::new(arr);
    Ok((addr, sk))
}

/// Derive the sender address, cross-checking SUI_ADDRESS when the key
/// came from the environment
fn resolve_sender_address(secret_key: &[u8; 32], using_provided_key: bool) -> Result<sui::Address> {
    let derived_address = derive_address_from_secret_key(secret_key);

    if using_provided_key {
        return Ok(derived_address);
    }

    let env_addr = sui::Address::from_str(&env::var("SUI_ADDRESS")?)?;
    if env_addr != derived_address {
        return Err(anyhow!(
            "Address mismatch: environment address does not match derived address"
        ));
    }
    Ok(env_addr)
}

/// Get reference gas price from the network
pub async fn get_reference_gas_price(client: &mut GrpcClient) -> Result<u64> {
    let mut ledger = client.ledger_client();
    let _resp = ledger
        .get_service_info(proto::GetServiceInfoRequest::default())
        .await?
        .into_inner();
    // ServiceInfo does not expose gas price yet; default to 1000
    let price = 1_000u64;
    debug!("Using reference gas price: {}", price);
    Ok(price)
}

/// Pick a SUI gas object owned by `owner`, refetching version/digest
/// when the listing omits them
pub async fn pick_gas_object(
    client: &mut GrpcClient,
    owner: sui::Address,
) -> Result<sui::ObjectReference> {
    let mut state = client.state_client();
    debug!("Listing owned objects for owner: {}", owner);

    let mut list_req = proto::ListOwnedObjectsRequest::default();
    list_req.owner = Some(owner.to_string());
    list_req.page_size = Some(100);
    list_req.page_token = None;
    list_req.read_mask = Some(prost_types::FieldMask {
        paths: vec![
            "object_id".into(),
            "version".into(),
            "digest".into(),
            "object_type".into(),
        ],
    });
    list_req.object_type = Some(crate::constants::SUI_COIN_TYPE.to_string());

    let resp = state.list_owned_objects(list_req).await?.into_inner();

    debug!("Owned objects returned: {}", resp.objects.len());

    let obj = resp
        .objects
        .into_iter()
        .find(|o| {
            o.object_type
                .as_ref()
                .map(|t| t.contains("::sui::SUI"))
                .unwrap_or(true)
        })
        .ok_or_else(|| anyhow!("no owned SUI coins to use as gas for {}", owner))?;

    let object_id_str = obj
        .object_id
        .clone()
        .ok_or_else(|| anyhow!("missing object id"))?;

    let (version, digest_str) = if let (Some(version), Some(digest)) = (obj.version, &obj.digest) {
        (version, digest.clone())
    } else {
        debug!("Digest/version missing; fetching object details");
        let mut ledger = client.ledger_client();
        let mut get_obj_req = proto::GetObjectRequest::default();
        get_obj_req.object_id = Some(object_id_str.clone());
        get_obj_req.read_mask = Some(prost_types::FieldMask {
            paths: vec!["object_id".into(), "version".into(), "digest".into()],
        });
        let details = ledger
            .get_object(get_obj_req)
            .await?
            .into_inner()
            .object
            .ok_or_else(|| anyhow!("gas object {} disappeared", object_id_str))?;
        (
            details
                .version
                .ok_or_else(|| anyhow!("gas object {} has no version", object_id_str))?,
            details
                .digest
                .ok_or_else(|| anyhow!("gas object {} has no digest", object_id_str))?,
        )
    };

    let object_id = sui::Address::from_str(&object_id_str)?;
    let digest = sui::Digest::from_base58(&digest_str)?;
    Ok(sui::ObjectReference::new(object_id, version, digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_address_is_stable() {
        let a = derive_address_from_secret_key(&[5u8; 32]);
        let b = derive_address_from_secret_key(&[5u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, derive_address_from_secret_key(&[6u8; 32]));
    }

    #[test]
    fn explicit_rpc_url_wins() {
        let url = resolve_rpc_url(Some("http://localhost:9000".into()), None).unwrap();
        assert_eq!(url, "http://localhost:9000");
    }

    #[test]
    fn rejects_unknown_chain() {
        assert!(resolve_rpc_url(None, Some("localnet".into())).is_err());
    }
}

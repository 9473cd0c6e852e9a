use serde_json::Value;
use std::env;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::error::{Result, WalrusError};

/// Get the maximum number of retries for Walrus operations from env var or default
fn get_max_retries() -> u32 {
    static MAX_RETRIES_CACHE: OnceLock<u32> = OnceLock::new();
    *MAX_RETRIES_CACHE.get_or_init(|| {
        env::var("WALRUS_MAX_RETRIES")
            .unwrap_or_else(|_| "4".to_string())
            .parse::<u32>()
            .unwrap_or(4)
    })
}

const BASE_RETRY_DELAY_SECS: u64 = 5;

/// Which Walrus daemon the client talks to, from `WALRUS_NETWORK`
#[derive(Debug, Clone, Default)]
pub enum Daemon {
    Local,
    #[default]
    Testnet,
}

impl Daemon {
    pub fn from_env() -> Self {
        match env::var("WALRUS_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => Daemon::Local,
            _ => Daemon::Testnet,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalrusConfig {
    pub daemon: Daemon,
    pub min_epochs: u32,
    pub max_epochs: u32,
}

impl Default for WalrusConfig {
    fn default() -> Self {
        Self {
            daemon: Daemon::from_env(),
            min_epochs: 2,
            max_epochs: 53,
        }
    }
}

impl WalrusConfig {
    pub fn base_publisher_url(&self) -> String {
        match self.daemon {
            Daemon::Local => "http://127.0.0.1:31415".to_string(),
            Daemon::Testnet => env::var("WALRUS_PUBLISHER")
                .unwrap_or_else(|_| "https://wal-publisher-testnet.staketab.org".to_string()),
        }
    }

    pub fn reader_url(&self) -> String {
        match self.daemon {
            Daemon::Local => "http://127.0.0.1:31415/v1/blobs/".to_string(),
            Daemon::Testnet => env::var("WALRUS_AGGREGATOR").unwrap_or_else(|_| {
                "https://wal-aggregator-testnet.staketab.org/v1/blobs/".to_string()
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreBlobParams {
    pub data: Vec<u8>,
    /// Sui address to receive the created blob object, if any
    pub send_object_to: Option<String>,
    pub num_epochs: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ReadBlobParams {
    pub blob_id: String,
}

/// HTTP client against the Walrus publisher/aggregator daemons
pub struct WalrusClient {
    config: WalrusConfig,
    client: reqwest::Client,
}

impl WalrusClient {
    pub fn new() -> Self {
        Self {
            config: WalrusConfig::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_config(config: WalrusConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Store a blob, returning its blob id. Retries transport failures
    /// with exponential backoff up to WALRUS_MAX_RETRIES attempts.
    pub async fn store(&self, params: StoreBlobParams) -> Result<String> {
        let send_to_param = params
            .send_object_to
            .as_ref()
            .map(|addr| format!("&send_object_to={}", addr))
            .unwrap_or_default();

        let epochs = params
            .num_epochs
            .unwrap_or(2)
            .clamp(self.config.min_epochs, self.config.max_epochs);

        let url = format!(
            "{}/v1/blobs?epochs={}{}",
            self.config.base_publisher_url(),
            epochs,
            send_to_param
        );

        let max_retries = get_max_retries();

        for attempt in 1..=max_retries {
            debug!("Writing to Walrus (attempt {}/{})", attempt, max_retries);
            let start = Instant::now();

            // body() consumes the data, so clone per attempt
            let data_clone = params.data.clone();

            let response = match self.client.put(&url).body(data_clone).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt < max_retries {
                        let retry_delay = BASE_RETRY_DELAY_SECS * 2_u64.pow((attempt - 1) as u32);
                        warn!(
                            "Failed to send request to Walrus (attempt {}/{}): {}. Retrying in {} seconds...",
                            attempt, max_retries, e, retry_delay
                        );
                        sleep(Duration::from_secs(retry_delay)).await;
                        continue;
                    } else {
                        error!(
                            "Failed to send request to Walrus after {} attempts: {}",
                            max_retries, e
                        );
                        return Err(WalrusError::Network(format!(
                            "Failed to send request after {} attempts: {}",
                            max_retries, e
                        )));
                    }
                }
            };

            let elapsed = start.elapsed();
            debug!("Walrus store request completed in {:?}", elapsed);

            let status = response.status();
            if status.is_success() {
                let info: Value = response.json().await.map_err(|e| {
                    WalrusError::Encoding(format!("Failed to parse publisher response: {}", e))
                })?;

                return match parse_store_response(&info) {
                    Some(blob_id) => {
                        info!("Walrus blobId: {}", blob_id);
                        Ok(blob_id)
                    }
                    None => Err(WalrusError::Encoding(format!(
                        "Publisher response carries no blob id: {}",
                        info
                    ))),
                };
            }

            if status == reqwest::StatusCode::PAYMENT_REQUIRED {
                return Err(WalrusError::InsufficientBalance(format!(
                    "Publisher rejected store: {}",
                    status
                )));
            }

            if status.is_server_error() && attempt < max_retries {
                let retry_delay = BASE_RETRY_DELAY_SECS * 2_u64.pow((attempt - 1) as u32);
                warn!(
                    "Walrus store failed with {} (attempt {}/{}). Retrying in {} seconds...",
                    status, attempt, max_retries, retry_delay
                );
                sleep(Duration::from_secs(retry_delay)).await;
                continue;
            }

            error!(
                "Walrus store failed: {} {}",
                status,
                status.canonical_reason().unwrap_or("Unknown error")
            );
            return Err(WalrusError::Network(format!(
                "Publisher returned {}",
                status
            )));
        }

        Err(WalrusError::Network(format!(
            "Walrus store exhausted {} attempts",
            max_retries
        )))
    }

    /// Read a blob back as text
    pub async fn read(&self, params: ReadBlobParams) -> Result<String> {
        if params.blob_id.is_empty() {
            return Err(WalrusError::Configuration("blobId is not provided".into()));
        }

        info!("Reading walrus blob: {}", params.blob_id);
        let start = Instant::now();

        let url = self.blob_url(&params.blob_id)?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalrusError::Network(format!("Failed to send request: {}", e)))?;

        let elapsed = start.elapsed();
        debug!("Walrus read completed in {:?}", elapsed);

        if response.status().is_success() {
            response.text().await.map_err(|e| WalrusError::BlobRetrieval {
                blob_id: params.blob_id.clone(),
                message: format!("Failed to read response body: {}", e),
            })
        } else {
            let status = response.status();
            error!(
                "Walrus read failed: {} {}",
                status,
                status.canonical_reason().unwrap_or("Unknown error")
            );
            Err(WalrusError::BlobRetrieval {
                blob_id: params.blob_id,
                message: format!("Aggregator returned {}", status),
            })
        }
    }

    /// Aggregator URL for a blob id; used for synthesized cover URLs
    pub fn blob_url(&self, blob_id: &str) -> Result<String> {
        if blob_id.is_empty() {
            return Err(WalrusError::Configuration("blobId is not set".into()));
        }
        Ok(format!("{}{}", self.config.reader_url(), blob_id))
    }
}

impl Default for WalrusClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the blob id from a publisher store response. The publisher
/// answers with `newlyCreated.blobObject.blobId` on a first store and
/// `alreadyCertified.blobId` when the blob was already on the network.
pub fn parse_store_response(info: &Value) -> Option<String> {
    info.pointer("/newlyCreated/blobObject/blobId")
        .or_else(|| info.pointer("/alreadyCertified/blobId"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_newly_created_response() {
        let info = json!({
            "newlyCreated": {
                "blobObject": { "id": "0x1", "blobId": "abc123", "size": 42 }
            }
        });
        assert_eq!(parse_store_response(&info).as_deref(), Some("abc123"));
    }

    #[test]
    fn parses_already_certified_response() {
        let info = json!({
            "alreadyCertified": { "blobId": "xyz789", "endEpoch": 53 }
        });
        assert_eq!(parse_store_response(&info).as_deref(), Some("xyz789"));
    }

    #[test]
    fn unknown_response_shape_yields_none() {
        assert!(parse_store_response(&json!({})).is_none());
        assert!(parse_store_response(&json!({"newlyCreated": {}})).is_none());
        assert!(parse_store_response(&json!({"alreadyCertified": {"blobId": 7}})).is_none());
    }

    #[test]
    fn blob_url_requires_blob_id() {
        let client = WalrusClient::with_config(WalrusConfig {
            daemon: Daemon::Local,
            min_epochs: 2,
            max_epochs: 53,
        });
        assert!(client.blob_url("").is_err());
        assert_eq!(
            client.blob_url("abc").unwrap(),
            "http://127.0.0.1:31415/v1/blobs/abc"
        );
    }
}

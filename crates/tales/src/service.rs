use std::sync::Arc;

use db::{NewTale, TaleDatabase, TaleMetadataPatch, tales};
use sui::constants::{TALES_MODULE, TALE_STRUCT};
use sui::{
    ExpectedObjectType, MintTaleParams, SharedSuiState, SuiInterfaceError, build_tale_mint_tx,
    check_effects_success, fetch_transaction, find_created_object, serialize_transaction,
};
use sui_rpc::proto::sui::rpc::v2 as proto;
use tracing::{debug, info, warn};
use walrus::{FundedSigner, ReadBlobParams, StoreBlobParams, WalrusClient};

use crate::auth::{AuthorizationRequest, verify_upload_authorization};
use crate::error::TaleError;
use crate::publication::PendingPublications;

/// Placeholder returned on the read path when a tale's content blob
/// can no longer be fetched from Walrus. The row itself is still
/// served; there is no repair mechanism.
pub const CONTENT_UNAVAILABLE_SENTINEL: &str = "[content unavailable]";

const WORDS_PER_MINUTE: i32 = 200;

/// Everything `initiate-publication` needs: the signed authorization
/// plus the tale fields to stage for later persistence.
#[derive(Debug, Clone)]
pub struct PrepareTalePublicationRequest {
    pub user_address: String,
    pub signature: String,
    pub public_key: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub cover_image_url: Option<String>,
    pub cover_image_blob_id: Option<String>,
    pub tags: Vec<String>,
    pub word_count: Option<i32>,
    pub reading_time: Option<i32>,
    pub price_mist: Option<u64>,
    pub capacity: Option<u64>,
    pub royalty_bps: Option<u16>,
    pub epochs: Option<u32>,
}

impl PrepareTalePublicationRequest {
    /// Boundary validation, independent of the web framework
    pub fn validate(&self) -> Result<(), TaleError> {
        if self.user_address.trim().is_empty() {
            return Err(TaleError::BadRequest("userAddress is required".into()));
        }
        if self.title.trim().is_empty() {
            return Err(TaleError::BadRequest("title is required".into()));
        }
        if self.content.is_empty() {
            return Err(TaleError::BadRequest("content is required".into()));
        }
        if self.signature.is_empty() || self.public_key.is_empty() {
            return Err(TaleError::BadRequest(
                "signature and publicKey are required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PreparedPublicationResponse {
    pub publication_id: String,
    pub content_blob_id: String,
    pub transaction_block_bytes: String,
}

#[derive(Debug, Clone)]
pub struct RecordTalePublicationRequest {
    pub publication_id: String,
    pub sui_tx_digest: String,
}

/// Batch flow: the browser uploaded both blobs and executed the
/// combined transaction itself; the backend only verifies and persists.
#[derive(Debug, Clone)]
pub struct RecordBatchPublicationRequest {
    pub user_address: String,
    pub title: String,
    pub description: String,
    pub content_blob_id: String,
    pub cover_blob_id: String,
    pub tags: Vec<String>,
    pub word_count: Option<i32>,
    pub reading_time: Option<i32>,
    pub sui_tx_digest: String,
}

#[derive(Debug, Clone)]
pub struct CreateTaleRequest {
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub blob_id: Option<String>,
    pub cover_image_url: Option<String>,
    pub cover_image_blob_id: Option<String>,
    pub tags: Vec<String>,
    pub author_id: String,
}

/// A tale row joined with its content from Walrus
#[derive(Debug, Clone)]
pub struct FullTale {
    pub tale: tales::Model,
    pub content: String,
}

/// Orchestrates wallets, Walrus and the Sui chain around the tales store
pub struct TalesService {
    db: Arc<TaleDatabase>,
    walrus: Arc<WalrusClient>,
    funded_signer: Arc<FundedSigner>,
    pending: PendingPublications,
}

impl TalesService {
    pub fn new(
        db: Arc<TaleDatabase>,
        walrus: Arc<WalrusClient>,
        funded_signer: Arc<FundedSigner>,
    ) -> Self {
        Self {
            db,
            walrus,
            funded_signer,
            pending: PendingPublications::default(),
        }
    }

    fn word_count(content: &str, provided: Option<i32>) -> i32 {
        provided.unwrap_or_else(|| content.split_whitespace().count() as i32)
    }

    fn reading_time(word_count: i32, provided: Option<i32>) -> i32 {
        provided.unwrap_or_else(|| (word_count / WORDS_PER_MINUTE).max(1))
    }

    /// Phase one of the publish flow: verify the wallet's authorization,
    /// persist the content blob, build the unsigned mint transaction and
    /// stage the row fields. Nothing touches the database here; if the
    /// wallet never signs, only the uploaded blob is left behind.
    pub async fn prepare_tale_publication(
        &self,
        request: PrepareTalePublicationRequest,
    ) -> Result<PreparedPublicationResponse, TaleError> {
        request.validate()?;

        let author = verify_upload_authorization(&AuthorizationRequest {
            user_address: request.user_address.clone(),
            signature: request.signature.clone(),
            public_key: request.public_key.clone(),
            title: request.title.clone(),
        })?;

        // Storage costs WAL and gas; top up before the upload, not as a
        // hidden side effect inside it
        self.funded_signer.ensure_funded().await?;

        let word_count = Self::word_count(&request.content, request.word_count);
        let reading_time = Self::reading_time(word_count, request.reading_time);
        let cover_image_url = request.cover_image_url.clone().unwrap_or_default();

        let publication_id = self.pending.draft(
            request.user_address.clone(),
            request.title.clone(),
            request.description.clone(),
            cover_image_url.clone(),
            request.cover_image_blob_id.clone(),
            request.tags.clone(),
            word_count,
            reading_time,
        );

        let content_blob_id = self
            .walrus
            .store(StoreBlobParams {
                data: request.content.into_bytes(),
                send_object_to: None,
                num_epochs: request.epochs,
            })
            .await?;
        self.pending
            .mark_blob_uploaded(&publication_id, content_blob_id.clone());

        let params = MintTaleParams {
            sender: author,
            title: request.title,
            description: request.description,
            content_blob_id: content_blob_id.clone(),
            cover_image_url,
            price_mist: request.price_mist,
            capacity: request.capacity,
            royalty_bps: request.royalty_bps,
        };

        let tx = build_tale_mint_tx(&params)
            .await
            .map_err(|e| TaleError::Internal(format!("Failed to build mint transaction: {}", e)))?;
        let transaction_block_bytes = serialize_transaction(&tx)
            .map_err(|e| TaleError::Internal(format!("Failed to serialize transaction: {}", e)))?;

        self.pending.mark_tx_prepared(&publication_id);

        info!(
            "Prepared publication {} for {} (blob {})",
            publication_id, author, content_blob_id
        );

        Ok(PreparedPublicationResponse {
            publication_id,
            content_blob_id,
            transaction_block_bytes,
        })
    }

    /// Verify that the digest belongs to a successful transaction on
    /// chain. Returns the effects for further inspection.
    async fn require_successful_transaction(
        &self,
        digest: &str,
    ) -> Result<proto::TransactionEffects, TaleError> {
        let executed = fetch_transaction(digest).await.map_err(|e| match e {
            SuiInterfaceError::TransactionNotFound(d) => {
                TaleError::NotFound(format!("transaction {} not found on chain", d))
            }
            other => TaleError::Sui(other),
        })?;

        let effects = executed.effects.ok_or_else(|| {
            TaleError::OnChainFailure(format!("transaction {} carries no effects", digest))
        })?;

        check_effects_success(&effects, digest)
            .map_err(|e| TaleError::OnChainFailure(e.to_string()))?;

        Ok(effects)
    }

    /// Phase two: the wallet executed the mint transaction; verify it
    /// succeeded, locate the created Tale object and persist the row.
    /// Recording the same digest twice returns the existing row.
    pub async fn record_tale_publication(
        &self,
        request: RecordTalePublicationRequest,
    ) -> Result<tales::Model, TaleError> {
        let digest = request.sui_tx_digest.trim();
        if digest.is_empty() {
            return Err(TaleError::BadRequest("suiTxDigest is required".into()));
        }

        if let Some(existing) = self
            .db
            .find_by_tx_digest(digest)
            .await
            .map_err(|e| TaleError::Database(e.to_string()))?
        {
            debug!("Digest {} already recorded as tale {}", digest, existing.id);
            return Ok(existing);
        }

        let effects = self.require_successful_transaction(digest).await?;

        let package_id = SharedSuiState::get_instance().get_tales_package_id_required();
        let expected = ExpectedObjectType::new(package_id, TALES_MODULE, TALE_STRUCT);
        let sui_object_id = find_created_object(&effects, &expected).ok_or_else(|| {
            TaleError::OnChainFailure(format!(
                "transaction {} created no object of type {}",
                digest,
                expected.canonical()
            ))
        })?;

        let prepared = self
            .pending
            .take_for_record(&request.publication_id)
            .ok_or_else(|| {
                TaleError::NotFound(format!(
                    "unknown or expired publication flow {}",
                    request.publication_id
                ))
            })?;

        let content_blob_id = prepared.content_blob_id.clone().ok_or_else(|| {
            TaleError::Internal(format!(
                "publication flow {} has no content blob",
                prepared.id
            ))
        })?;

        let inserted = self
            .db
            .insert(NewTale {
                title: prepared.title.clone(),
                description: prepared.description.clone(),
                blob_id: content_blob_id,
                cover_image_url: prepared.cover_image_url.clone(),
                cover_image_blob_id: prepared.cover_image_blob_id.clone(),
                tags: prepared.tags.clone(),
                word_count: prepared.word_count,
                reading_time: prepared.reading_time,
                author_id: prepared.author_id.clone(),
                sui_tx_digest: Some(digest.to_string()),
                sui_object_id: Some(sui_object_id.clone()),
            })
            .await
            .map_err(|e| {
                // Put the flow back so a transient insert failure is retryable
                self.pending.restore(prepared);
                TaleError::Database(e.to_string())
            })?;

        info!(
            "Recorded tale {} (tx {}, object {})",
            inserted.id, digest, sui_object_id
        );
        Ok(inserted)
    }

    /// Batch variant: blobs and transaction came from the browser; the
    /// backend verifies the transaction and persists the row with a
    /// synthesized cover URL. Object-id extraction is deferred.
    pub async fn record_batch_publication(
        &self,
        request: RecordBatchPublicationRequest,
    ) -> Result<tales::Model, TaleError> {
        let digest = request.sui_tx_digest.trim();
        if digest.is_empty() {
            return Err(TaleError::BadRequest("suiTransactionDigest is required".into()));
        }
        if request.content_blob_id.is_empty() || request.cover_blob_id.is_empty() {
            return Err(TaleError::BadRequest(
                "contentBlobId and coverBlobId are required".into(),
            ));
        }

        if let Some(existing) = self
            .db
            .find_by_tx_digest(digest)
            .await
            .map_err(|e| TaleError::Database(e.to_string()))?
        {
            debug!("Digest {} already recorded as tale {}", digest, existing.id);
            return Ok(existing);
        }

        self.require_successful_transaction(digest).await?;

        let cover_image_url = self.walrus.blob_url(&request.cover_blob_id)?;
        let word_count = request.word_count.unwrap_or(0);
        let reading_time = Self::reading_time(word_count, request.reading_time);

        let inserted = self
            .db
            .insert(NewTale {
                title: request.title,
                description: request.description,
                blob_id: request.content_blob_id,
                cover_image_url,
                cover_image_blob_id: Some(request.cover_blob_id),
                tags: request.tags,
                word_count,
                reading_time,
                author_id: request.user_address,
                sui_tx_digest: Some(digest.to_string()),
                sui_object_id: None,
            })
            .await
            .map_err(|e| TaleError::Database(e.to_string()))?;

        info!("Recorded batch publication {} (tx {})", inserted.id, digest);
        Ok(inserted)
    }

    /// Direct create without on-chain linkage. Content is stored on
    /// Walrus when provided inline; otherwise an existing blob id is
    /// required.
    pub async fn create_tale(&self, request: CreateTaleRequest) -> Result<tales::Model, TaleError> {
        if request.title.trim().is_empty() {
            return Err(TaleError::BadRequest("title is required".into()));
        }

        let (blob_id, word_count) = match (&request.content, &request.blob_id) {
            (Some(content), _) => {
                self.funded_signer.ensure_funded().await?;
                let blob_id = self
                    .walrus
                    .store(StoreBlobParams {
                        data: content.clone().into_bytes(),
                        send_object_to: None,
                        num_epochs: None,
                    })
                    .await?;
                (blob_id, content.split_whitespace().count() as i32)
            }
            (None, Some(blob_id)) => (blob_id.clone(), 0),
            (None, None) => {
                return Err(TaleError::BadRequest(
                    "either content or blobId is required".into(),
                ));
            }
        };

        self.db
            .insert(NewTale {
                title: request.title,
                description: request.description,
                blob_id,
                cover_image_url: request.cover_image_url.unwrap_or_default(),
                cover_image_blob_id: request.cover_image_blob_id,
                tags: request.tags,
                word_count,
                reading_time: (word_count / WORDS_PER_MINUTE).max(1),
                author_id: request.author_id,
                sui_tx_digest: None,
                sui_object_id: None,
            })
            .await
            .map_err(|e| TaleError::Database(e.to_string()))
    }

    pub async fn list_tales(&self, page: u64, limit: u64) -> Result<Vec<tales::Model>, TaleError> {
        self.db
            .find_all(page, limit)
            .await
            .map_err(|e| TaleError::Database(e.to_string()))
    }

    pub async fn get_tale(&self, id: &str) -> Result<tales::Model, TaleError> {
        self.db
            .find_by_id(id)
            .await
            .map_err(|e| TaleError::Database(e.to_string()))?
            .ok_or_else(|| TaleError::NotFound(format!("tale {} not found", id)))
    }

    /// Metadata plus content. Content retrieval failures degrade to the
    /// sentinel string instead of failing the whole response.
    pub async fn get_full_tale(&self, id: &str) -> Result<FullTale, TaleError> {
        let tale = self.get_tale(id).await?;

        let content = match self
            .walrus
            .read(ReadBlobParams {
                blob_id: tale.blob_id.clone(),
            })
            .await
        {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Content for tale {} (blob {}) is unavailable: {}",
                    tale.id, tale.blob_id, e
                );
                CONTENT_UNAVAILABLE_SENTINEL.to_string()
            }
        };

        Ok(FullTale { tale, content })
    }

    pub async fn update_tale(
        &self,
        id: &str,
        patch: TaleMetadataPatch,
    ) -> Result<tales::Model, TaleError> {
        self.db
            .update_metadata(id, patch)
            .await
            .map_err(|e| TaleError::Database(e.to_string()))?
            .ok_or_else(|| TaleError::NotFound(format!("tale {} not found", id)))
    }

    pub async fn delete_tale(&self, id: &str) -> Result<(), TaleError> {
        let deleted = self
            .db
            .delete(id)
            .await
            .map_err(|e| TaleError::Database(e.to_string()))?;
        if !deleted {
            return Err(TaleError::NotFound(format!("tale {} not found", id)));
        }
        Ok(())
    }

    /// Store raw cover image bytes on Walrus; returns the blob id and
    /// its aggregator URL
    pub async fn upload_cover(
        &self,
        data: Vec<u8>,
        epochs: Option<u32>,
    ) -> Result<(String, String), TaleError> {
        if data.is_empty() {
            return Err(TaleError::BadRequest("cover image is empty".into()));
        }

        self.funded_signer.ensure_funded().await?;

        let blob_id = self
            .walrus
            .store(StoreBlobParams {
                data,
                send_object_to: None,
                num_epochs: epochs,
            })
            .await?;
        let url = self.walrus.blob_url(&blob_id)?;
        Ok((blob_id, url))
    }

    /// Explicit SUI→WAL exchange, surfaced as its own endpoint
    pub async fn exchange_sui_for_wal(&self, amount_mist: u64) -> Result<String, TaleError> {
        if amount_mist == 0 {
            return Err(TaleError::BadRequest("amount must be positive".into()));
        }
        Ok(self.funded_signer.exchange_sui_for_wal(amount_mist).await?)
    }
}

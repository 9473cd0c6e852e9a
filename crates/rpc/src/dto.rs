use chrono::{DateTime, Utc};
use db::entity::tales as tale_entity;
use db::{TaleMetadataPatch, tags_from_json};
use serde::{Deserialize, Serialize};
use tales::{
    CreateTaleRequest, FullTale, PrepareTalePublicationRequest, PreparedPublicationResponse,
    RecordBatchPublicationRequest, RecordTalePublicationRequest,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePublicationDto {
    pub user_address: String,
    pub signature: String,
    pub public_key: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    pub cover_image_url: Option<String>,
    pub cover_image_blob_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub word_count: Option<i32>,
    pub reading_time: Option<i32>,
    pub mint_price: Option<u64>,
    pub mint_capacity: Option<u64>,
    pub royalty_bps: Option<u16>,
    pub epochs: Option<u32>,
}

impl From<InitiatePublicationDto> for PrepareTalePublicationRequest {
    fn from(dto: InitiatePublicationDto) -> Self {
        Self {
            user_address: dto.user_address,
            signature: dto.signature,
            public_key: dto.public_key,
            title: dto.title,
            description: dto.description,
            content: dto.content,
            cover_image_url: dto.cover_image_url,
            cover_image_blob_id: dto.cover_image_blob_id,
            tags: dto.tags,
            word_count: dto.word_count,
            reading_time: dto.reading_time,
            price_mist: dto.mint_price,
            capacity: dto.mint_capacity,
            royalty_bps: dto.royalty_bps,
            epochs: dto.epochs,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedPublicationDto {
    pub publication_id: String,
    pub content_blob_id: String,
    pub transaction_block_bytes: String,
}

impl From<PreparedPublicationResponse> for PreparedPublicationDto {
    fn from(response: PreparedPublicationResponse) -> Self {
        Self {
            publication_id: response.publication_id,
            content_blob_id: response.content_blob_id,
            transaction_block_bytes: response.transaction_block_bytes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPublicationDto {
    pub publication_id: String,
    pub sui_tx_digest: String,
}

impl From<RecordPublicationDto> for RecordTalePublicationRequest {
    fn from(dto: RecordPublicationDto) -> Self {
        Self {
            publication_id: dto.publication_id,
            sui_tx_digest: dto.sui_tx_digest,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBatchPublicationDto {
    pub user_address: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content_blob_id: String,
    pub cover_blob_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub word_count: Option<i32>,
    pub reading_time: Option<i32>,
    pub sui_transaction_digest: String,
}

impl From<RecordBatchPublicationDto> for RecordBatchPublicationRequest {
    fn from(dto: RecordBatchPublicationDto) -> Self {
        Self {
            user_address: dto.user_address,
            title: dto.title,
            description: dto.description,
            content_blob_id: dto.content_blob_id,
            cover_blob_id: dto.cover_blob_id,
            tags: dto.tags,
            word_count: dto.word_count,
            reading_time: dto.reading_time,
            sui_tx_digest: dto.sui_transaction_digest,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaleDto {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: Option<String>,
    pub blob_id: Option<String>,
    pub cover_image_url: Option<String>,
    pub cover_image_blob_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author_id: String,
}

impl From<CreateTaleDto> for CreateTaleRequest {
    fn from(dto: CreateTaleDto) -> Self {
        Self {
            title: dto.title,
            description: dto.description,
            content: dto.content,
            blob_id: dto.blob_id,
            cover_image_url: dto.cover_image_url,
            cover_image_blob_id: dto.cover_image_blob_id,
            tags: dto.tags,
            author_id: dto.author_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaleDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl From<UpdateTaleDto> for TaleMetadataPatch {
    fn from(dto: UpdateTaleDto) -> Self {
        Self {
            title: dto.title,
            description: dto.description,
            cover_image_url: dto.cover_image_url,
            tags: dto.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CoverUploadQuery {
    pub epochs: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverUploadDto {
    pub blob_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeDto {
    pub amount_mist: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResultDto {
    pub tx_digest: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaleDto {
    pub id: String,
    pub title: String,
    pub description: String,
    pub blob_id: String,
    pub cover_image_url: String,
    pub cover_image_blob_id: Option<String>,
    pub tags: Vec<String>,
    pub word_count: i32,
    pub reading_time: i32,
    pub author_id: String,
    pub sui_tx_digest: Option<String>,
    pub sui_object_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<tale_entity::Model> for TaleDto {
    fn from(model: tale_entity::Model) -> Self {
        let tags = tags_from_json(model.tags.as_deref());
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            blob_id: model.blob_id,
            cover_image_url: model.cover_image_url,
            cover_image_blob_id: model.cover_image_blob_id,
            tags,
            word_count: model.word_count,
            reading_time: model.reading_time,
            author_id: model.author_id,
            sui_tx_digest: model.sui_tx_digest,
            sui_object_id: model.sui_object_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullTaleDto {
    #[serde(flatten)]
    pub tale: TaleDto,
    pub content: String,
}

impl From<FullTale> for FullTaleDto {
    fn from(full: FullTale) -> Self {
        Self {
            tale: full.tale.into(),
            content: full.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
}

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::tales;

/// Fields required to create a tale row. The id and timestamps are
/// assigned on insert.
#[derive(Debug, Clone)]
pub struct NewTale {
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
}

/// Partial metadata patch. Absent fields are left untouched;
/// `blob_id`, `author_id` and the on-chain identifiers are not
/// patchable at all.
#[derive(Debug, Clone, Default)]
pub struct TaleMetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TaleMetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.cover_image_url.is_none()
            && self.tags.is_none()
    }
}

pub fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

pub fn tags_from_json(tags: Option<&str>) -> Vec<String> {
    tags.and_then(|t| serde_json::from_str(t).ok())
        .unwrap_or_default()
}

/// Repository over the `tales` table
pub struct TaleDatabase {
    connection: DatabaseConnection,
}

impl TaleDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to tales database...");
        let connection = Database::connect(database_url).await?;
        info!("Successfully connected to tales database");
        Ok(Self { connection })
    }

    pub fn with_connection(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub async fn insert(&self, new_tale: NewTale) -> Result<tales::Model> {
        let now = Utc::now();
        let model = tales::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            title: Set(new_tale.title),
            description: Set(new_tale.description),
            blob_id: Set(new_tale.blob_id),
            cover_image_url: Set(new_tale.cover_image_url),
            cover_image_blob_id: Set(new_tale.cover_image_blob_id),
            tags: Set(Some(tags_to_json(&new_tale.tags))),
            word_count: Set(new_tale.word_count),
            reading_time: Set(new_tale.reading_time),
            author_id: Set(new_tale.author_id),
            sui_tx_digest: Set(new_tale.sui_tx_digest),
            sui_object_id: Set(new_tale.sui_object_id),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        };

        let inserted = model.insert(&self.connection).await?;
        debug!("Inserted tale {}", inserted.id);
        Ok(inserted)
    }

    /// Newest-first page of tales. `page` is zero-based.
    pub async fn find_all(&self, page: u64, limit: u64) -> Result<Vec<tales::Model>> {
        let paginator = tales::Entity::find()
            .order_by_desc(tales::Column::CreatedAt)
            .paginate(&self.connection, limit.max(1));
        Ok(paginator.fetch_page(page).await?)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(tales::Entity::find().count(&self.connection).await?)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<tales::Model>> {
        Ok(tales::Entity::find_by_id(id.to_string())
            .one(&self.connection)
            .await?)
    }

    /// Idempotency probe: a digest can only ever map to one row
    pub async fn find_by_tx_digest(&self, digest: &str) -> Result<Option<tales::Model>> {
        Ok(tales::Entity::find()
            .filter(tales::Column::SuiTxDigest.eq(digest))
            .one(&self.connection)
            .await?)
    }

    pub async fn find_by_author(&self, author_id: &str) -> Result<Vec<tales::Model>> {
        Ok(tales::Entity::find()
            .filter(tales::Column::AuthorId.eq(author_id))
            .order_by_desc(tales::Column::CreatedAt)
            .all(&self.connection)
            .await?)
    }

    /// Patch descriptive metadata only. Returns the updated row, or
    /// None when the id does not exist.
    pub async fn update_metadata(
        &self,
        id: &str,
        patch: TaleMetadataPatch,
    ) -> Result<Option<tales::Model>> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let mut model: tales::ActiveModel = existing.into();
        if let Some(title) = patch.title {
            model.title = Set(title);
        }
        if let Some(description) = patch.description {
            model.description = Set(description);
        }
        if let Some(cover_image_url) = patch.cover_image_url {
            model.cover_image_url = Set(cover_image_url);
        }
        if let Some(tags) = patch.tags {
            model.tags = Set(Some(tags_to_json(&tags)));
        }
        model.updated_at = Set(Some(Utc::now()));

        let updated = model.update(&self.connection).await?;
        debug!("Updated tale {}", updated.id);
        Ok(Some(updated))
    }

    /// Delete a tale; false when the id does not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = tales::Entity::delete_by_id(id.to_string())
            .exec(&self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

//! Tale entity: the read-optimized mirror of published tales.
//! `blob_id` and `sui_tx_digest` are immutable after insert; the
//! digest carries a unique index so repeated record calls can not
//! create duplicate rows.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub blob_id: String,
    pub cover_image_url: String,
    pub cover_image_blob_id: Option<String>,
    pub tags: Option<String>, // JSON array of strings
    pub word_count: i32,
    pub reading_time: i32,
    pub author_id: String,
    #[sea_orm(unique)]
    pub sui_tx_digest: Option<String>,
    pub sui_object_id: Option<String>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

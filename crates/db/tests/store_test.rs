use anyhow::Result;
use db::{NewTale, TaleDatabase, TaleMetadataPatch, tags_from_json};
use sea_orm::{ConnectionTrait, Database, Schema};

async fn test_db() -> Result<TaleDatabase> {
    let connection = Database::connect("sqlite::memory:").await?;
    let backend = connection.get_database_backend();
    let schema = Schema::new(backend);
    let stmt = schema.create_table_from_entity(db::tales::Entity);
    connection.execute(backend.build(&stmt)).await?;
    Ok(TaleDatabase::with_connection(connection))
}

fn sample_tale() -> NewTale {
    NewTale {
        title: "My Tale".to_string(),
        description: "A story about storage".to_string(),
        blob_id: "blob-1".to_string(),
        cover_image_url: "https://aggregator/v1/blobs/cover-1".to_string(),
        cover_image_blob_id: Some("cover-1".to_string()),
        tags: vec!["fiction".to_string(), "sui".to_string()],
        word_count: 1200,
        reading_time: 6,
        author_id: "0xabc".to_string(),
        sui_tx_digest: Some("DIGEST1".to_string()),
        sui_object_id: Some("0xobj1".to_string()),
    }
}

#[tokio::test]
async fn insert_and_find_round_trip() -> Result<()> {
    let db = test_db().await?;

    let inserted = db.insert(sample_tale()).await?;
    assert!(!inserted.id.is_empty());
    assert!(inserted.created_at.is_some());

    let found = db.find_by_id(&inserted.id).await?.expect("tale exists");
    assert_eq!(found.title, "My Tale");
    assert_eq!(found.blob_id, "blob-1");
    assert_eq!(
        tags_from_json(found.tags.as_deref()),
        vec!["fiction".to_string(), "sui".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn missing_id_yields_none_not_a_row() -> Result<()> {
    let db = test_db().await?;
    assert!(db.find_by_id("no-such-id").await?.is_none());
    assert!(!db.delete("no-such-id").await?);
    assert!(
        db.update_metadata("no-such-id", TaleMetadataPatch::default())
            .await?
            .is_none()
    );
    Ok(())
}

#[tokio::test]
async fn digest_lookup_finds_the_single_row() -> Result<()> {
    let db = test_db().await?;
    let inserted = db.insert(sample_tale()).await?;

    let found = db
        .find_by_tx_digest("DIGEST1")
        .await?
        .expect("digest indexed");
    assert_eq!(found.id, inserted.id);
    assert!(db.find_by_tx_digest("OTHER").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_digest_is_rejected_by_unique_index() -> Result<()> {
    let db = test_db().await?;
    db.insert(sample_tale()).await?;

    let mut duplicate = sample_tale();
    duplicate.title = "Same digest, different tale".to_string();
    assert!(db.insert(duplicate).await.is_err());
    Ok(())
}

#[tokio::test]
async fn partial_update_leaves_other_fields_unchanged() -> Result<()> {
    let db = test_db().await?;
    let inserted = db.insert(sample_tale()).await?;

    let updated = db
        .update_metadata(
            &inserted.id,
            TaleMetadataPatch {
                description: Some("new".to_string()),
                ..Default::default()
            },
        )
        .await?
        .expect("tale exists");

    assert_eq!(updated.description, "new");
    assert_eq!(updated.title, inserted.title);
    assert_eq!(updated.tags, inserted.tags);
    assert_eq!(updated.blob_id, inserted.blob_id);
    assert_eq!(updated.sui_tx_digest, inserted.sui_tx_digest);
    Ok(())
}

#[tokio::test]
async fn list_is_paged_newest_first() -> Result<()> {
    let db = test_db().await?;
    for i in 0..5 {
        let mut tale = sample_tale();
        tale.title = format!("Tale {}", i);
        tale.sui_tx_digest = Some(format!("DIGEST{}", i));
        db.insert(tale).await?;
    }

    assert_eq!(db.count().await?, 5);
    let first_page = db.find_all(0, 2).await?;
    assert_eq!(first_page.len(), 2);
    let second_page = db.find_all(1, 2).await?;
    assert_eq!(second_page.len(), 2);
    let third_page = db.find_all(2, 2).await?;
    assert_eq!(third_page.len(), 1);
    Ok(())
}

#[tokio::test]
async fn delete_removes_the_row() -> Result<()> {
    let db = test_db().await?;
    let inserted = db.insert(sample_tale()).await?;

    assert!(db.delete(&inserted.id).await?);
    assert!(db.find_by_id(&inserted.id).await?.is_none());
    Ok(())
}

pub mod entity;
pub mod store;

pub use entity::tales;
pub use store::{NewTale, TaleDatabase, TaleMetadataPatch, tags_from_json, tags_to_json};

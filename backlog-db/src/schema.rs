//! Collection names and the indexes the queries rely on.

use bson::{Document, doc};
use mongodb::{IndexModel, options::IndexOptions};

pub const IDEAS_COLLECTION: &str = "ideas";
pub const IDEA_DETAILS_COLLECTION: &str = "idea_details";
pub const LIKES_COLLECTION: &str = "likes";
pub const COMMENTS_COLLECTION: &str = "comments";
pub const BOOKMARKS_COLLECTION: &str = "bookmarks";
pub const PROJECTS_COLLECTION: &str = "projects";

fn index(keys: Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn unique_index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(Some(IndexOptions::builder().unique(true).build()))
        .build()
}

/// Every collection with the indexes it should carry.
pub(crate) fn indexes() -> Vec<(&'static str, Vec<IndexModel>)> {
    vec![
        (
            IDEAS_COLLECTION,
            vec![
                index(doc! { "tags": 1, "difficulty": 1, "created_at": -1 }),
                index(doc! { "likes_count": -1, "comments_count": -1, "created_at": -1 }),
                index(doc! { "author_id": 1, "created_at": -1 }),
            ],
        ),
        (IDEA_DETAILS_COLLECTION, vec![index(doc! { "idea_id": 1 })]),
        (
            LIKES_COLLECTION,
            vec![
                unique_index(doc! { "user_id": 1, "idea_id": 1 }),
                index(doc! { "idea_id": 1, "created_at": -1 }),
            ],
        ),
        (
            COMMENTS_COLLECTION,
            vec![
                index(doc! { "idea_id": 1, "created_at": -1 }),
                index(doc! { "user_id": 1, "created_at": -1 }),
            ],
        ),
        (
            BOOKMARKS_COLLECTION,
            vec![
                unique_index(doc! { "user_id": 1, "idea_id": 1 }),
                index(doc! { "user_id": 1, "created_at": -1 }),
            ],
        ),
    ]
}

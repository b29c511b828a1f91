//! Filters, sort orders and aggregation pipelines sent to MongoDB.

use crate::schema::{IDEA_DETAILS_COLLECTION, IDEAS_COLLECTION};
use backlog_common::{
    model::{
        idea::{IdeaFilter, IdeaSort},
        user::UserId,
    },
    pagination::PageRequest,
};
use bson::{Document, doc, oid::ObjectId};

pub(crate) fn idea_filter(filter: &IdeaFilter) -> Document {
    let mut document = Document::new();

    if !filter.tags.is_empty() {
        document.insert("tags", doc! { "$in": filter.tags.clone() });
    }
    if let Some(difficulty) = &filter.difficulty {
        document.insert("difficulty", difficulty.as_str());
    }

    document
}

pub(crate) fn idea_sort(sort: IdeaSort) -> Document {
    match sort {
        IdeaSort::Newest => doc! { "created_at": -1, "_id": -1 },
        IdeaSort::Trending => doc! {
            "likes_count": -1,
            "comments_count": -1,
            "created_at": -1,
            "_id": -1,
        },
        IdeaSort::Popular => doc! { "likes_count": -1, "_id": -1 },
    }
}

pub(crate) fn by_id(id: ObjectId) -> Document {
    doc! { "_id": id }
}

/// Matches the like or bookmark of one user on one idea.
pub(crate) fn fingerprint(user_id: &UserId, idea_id: ObjectId) -> Document {
    doc! {
        "user_id": user_id.get(),
        "idea_id": idea_id,
    }
}

/// Adjusts a denormalized counter, never taking it below zero.
pub(crate) fn counter_update(idea_id: ObjectId, field: &str, delta: i32) -> (Document, Document) {
    let mut filter = by_id(idea_id);
    if delta < 0 {
        filter.insert(field, doc! { "$gt": 0 });
    }

    (filter, doc! { "$inc": { field: delta } })
}

/// One idea with its details document attached, when there is one.
pub(crate) fn idea_with_details(idea_id: ObjectId) -> Vec<Document> {
    vec![
        doc! { "$match": { "_id": idea_id } },
        doc! {
            "$lookup": {
                "from": IDEA_DETAILS_COLLECTION,
                "let": { "ideaId": "$_id" },
                "pipeline": [
                    { "$match": { "$expr": { "$eq": ["$idea_id", "$$ideaId"] } } },
                    { "$limit": 1 },
                    { "$project": { "_id": 0, "idea_id": 0 } },
                ],
                "as": "details",
            }
        },
        doc! {
            "$unwind": {
                "path": "$details",
                "preserveNullAndEmptyArrays": true,
            }
        },
    ]
}

/// A page of the ideas a user bookmarked, most recent bookmark first.
///
/// Bookmarks pointing at ideas that no longer exist are dropped by the unwind.
pub(crate) fn bookmarked_ideas(user_id: &UserId, page: PageRequest) -> Vec<Document> {
    vec![
        doc! { "$match": { "user_id": user_id.get() } },
        doc! { "$sort": { "created_at": -1, "_id": -1 } },
        doc! { "$skip": page.skip().cast_signed() },
        doc! { "$limit": page.page_size().cast_signed() },
        doc! {
            "$lookup": {
                "from": IDEAS_COLLECTION,
                "localField": "idea_id",
                "foreignField": "_id",
                "as": "idea",
            }
        },
        doc! { "$unwind": "$idea" },
        doc! { "$replaceRoot": { "newRoot": "$idea" } },
    ]
}

pub(crate) fn comments_of(idea_id: ObjectId) -> Document {
    doc! { "idea_id": idea_id }
}

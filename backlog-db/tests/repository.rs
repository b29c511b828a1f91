//! Runs against the replica set named by `BACKLOG_TEST_MONGODB_URI`.
//!
//! Every test works in a fresh database and skips itself when the variable is unset.

use backlog_common::{
    model::{
        Id,
        comment::CommentContent,
        idea::{Difficulty, IdeaFilter, IdeaMarker, IdeaSort},
        user::UserId,
    },
    pagination::{PageRequest, Pagination},
    util::PositiveDuration,
};
use backlog_db::{
    client::{CommentDeletion, DbClient, Toggle},
    schema::{IDEA_DETAILS_COLLECTION, IDEAS_COLLECTION, LIKES_COLLECTION},
};
use bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::Client;
use std::time::Duration;

struct TestDb {
    db: DbClient,
    database: mongodb::Database,
}

impl TestDb {
    async fn connect() -> Option<Self> {
        let Ok(uri) = std::env::var("BACKLOG_TEST_MONGODB_URI") else {
            eprintln!("BACKLOG_TEST_MONGODB_URI is not set, skipping");
            return None;
        };

        let client = Client::with_uri_str(uri).await.unwrap();
        let name = format!("backlog_test_{}", ObjectId::new().to_hex());
        let database = client.database(&name);
        let db = DbClient::new(
            client,
            &name,
            PositiveDuration::new(Duration::from_secs(30)).unwrap(),
        );
        db.ensure_indexes().await.unwrap();

        Some(Self { db, database })
    }

    async fn insert_idea(&self, title: &str, likes: i64, created_at_millis: i64) -> Id<IdeaMarker> {
        let id = ObjectId::new();
        let created_at = DateTime::from_millis(created_at_millis);

        self.database
            .collection::<Document>(IDEAS_COLLECTION)
            .insert_one(doc! {
                "_id": id,
                "title": title,
                "description": format!("About {title}"),
                "tags": ["rust"],
                "difficulty": "medium",
                "created_at": created_at,
                "updated_at": created_at,
                "author_id": "author",
                "likes_count": likes,
                "comments_count": 0_i64,
            })
            .await
            .unwrap();

        Id::new(id)
    }

    async fn cleanup(self) {
        self.database.drop().await.unwrap();
    }
}

fn user(id: &str) -> UserId {
    UserId::new(id.to_owned()).unwrap()
}

#[tokio::test]
async fn likes_are_idempotent() {
    let Some(test) = TestDb::connect().await else {
        return;
    };
    let idea = test.insert_idea("Likeable", 0, 1_000).await;
    let alice = user("user_alice");

    assert_eq!(test.db.like_idea(&alice, idea).await.unwrap(), Some(Toggle::Changed));
    assert_eq!(test.db.like_idea(&alice, idea).await.unwrap(), Some(Toggle::Unchanged));
    let fetched = test.db.fetch_idea(idea).await.unwrap().unwrap();
    assert_eq!(fetched.likes_count, 1);

    assert_eq!(test.db.unlike_idea(&alice, idea).await.unwrap(), Toggle::Changed);
    assert_eq!(test.db.unlike_idea(&alice, idea).await.unwrap(), Toggle::Unchanged);
    let fetched = test.db.fetch_idea(idea).await.unwrap().unwrap();
    assert_eq!(fetched.likes_count, 0);

    test.cleanup().await;
}

#[tokio::test]
async fn liking_a_missing_idea_changes_nothing() {
    let Some(test) = TestDb::connect().await else {
        return;
    };

    let missing = Id::generate();
    assert_eq!(test.db.like_idea(&user("user_alice"), missing).await.unwrap(), None);
    assert_eq!(
        test.db.unlike_idea(&user("user_alice"), missing).await.unwrap(),
        Toggle::Unchanged
    );

    test.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_count_once_per_user() {
    let Some(test) = TestDb::connect().await else {
        return;
    };
    let idea = test.insert_idea("Popular", 0, 1_000).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let db = test.db.clone();
        // Two requests for every user.
        let caller = user(&format!("user_{}", i % 4));
        tasks.push(tokio::spawn(async move { db.like_idea(&caller, idea).await }));
    }
    let mut changed = 0;
    for task in tasks {
        // Write conflicts are retried inside the transaction.
        match task.await.unwrap() {
            Ok(Some(Toggle::Changed)) => changed += 1,
            Ok(Some(Toggle::Unchanged)) => {}
            other => panic!("like failed: {other:?}"),
        }
    }
    assert_eq!(changed, 4);

    let fetched = test.db.fetch_idea(idea).await.unwrap().unwrap();
    assert_eq!(fetched.likes_count, 4);

    let stored = test
        .database
        .collection::<Document>(LIKES_COLLECTION)
        .count_documents(doc! { "idea_id": idea.object_id() })
        .await
        .unwrap();
    assert_eq!(stored, 4);

    test.cleanup().await;
}

#[tokio::test]
async fn bookmarks_are_idempotent() {
    let Some(test) = TestDb::connect().await else {
        return;
    };
    let first = test.insert_idea("First", 0, 1_000).await;
    let second = test.insert_idea("Second", 0, 2_000).await;
    let bob = user("user_bob");

    assert_eq!(test.db.bookmark_idea(&bob, first).await.unwrap(), Some(Toggle::Changed));
    assert_eq!(test.db.bookmark_idea(&bob, first).await.unwrap(), Some(Toggle::Unchanged));
    assert_eq!(test.db.bookmark_idea(&bob, second).await.unwrap(), Some(Toggle::Changed));
    assert_eq!(test.db.bookmark_idea(&bob, Id::generate()).await.unwrap(), None);

    let page = test
        .db
        .fetch_bookmarked_ideas(&bob, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 2);
    assert_eq!(page.items.len(), 2);

    assert_eq!(test.db.unbookmark_idea(&bob, first).await.unwrap(), Toggle::Changed);
    assert_eq!(test.db.unbookmark_idea(&bob, first).await.unwrap(), Toggle::Unchanged);

    let page = test
        .db
        .fetch_bookmarked_ideas(&bob, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].id, second);

    test.cleanup().await;
}

#[tokio::test]
async fn details_are_optional() {
    let Some(test) = TestDb::connect().await else {
        return;
    };
    let plain = test.insert_idea("Plain", 0, 1_000).await;
    let detailed = test.insert_idea("Detailed", 0, 2_000).await;

    test.database
        .collection::<Document>(IDEA_DETAILS_COLLECTION)
        .insert_one(doc! {
            "idea_id": detailed.object_id(),
            "resources": ["https://doc.rust-lang.org/book/"],
            "estimated_hours": 12,
        })
        .await
        .unwrap();

    let plain = test.db.fetch_idea(plain).await.unwrap().unwrap();
    assert_eq!(plain.details, None);
    assert_eq!(plain.difficulty, Difficulty::Medium);

    let detailed = test.db.fetch_idea(detailed).await.unwrap().unwrap();
    let details = detailed.details.unwrap();
    assert_eq!(details["estimated_hours"], 12);
    assert!(!details.contains_key("idea_id"));

    assert_eq!(test.db.fetch_idea(Id::generate()).await.unwrap(), None);

    test.cleanup().await;
}

#[tokio::test]
async fn popular_listing_pages() {
    let Some(test) = TestDb::connect().await else {
        return;
    };
    for i in 0..25 {
        test.insert_idea(&format!("Idea {i}"), i, 1_000 + i).await;
    }

    let request = PageRequest::new(2, 10);
    let page = test
        .db
        .fetch_ideas(&IdeaFilter::default(), IdeaSort::Popular, request)
        .await
        .unwrap();

    assert_eq!(page.total_items, 25);
    let likes: Vec<u64> = page.items.iter().map(|idea| idea.likes_count).collect();
    assert_eq!(likes, (5..15).rev().collect::<Vec<u64>>());

    let pagination = Pagination::new(request, page.total_items);
    assert_eq!(pagination.total_pages, 3);
    assert!(pagination.has_next);
    assert!(pagination.has_prev);

    let filtered = test
        .db
        .fetch_ideas(
            &IdeaFilter {
                tags: vec!["go".to_owned()],
                difficulty: None,
            },
            IdeaSort::Newest,
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(filtered.total_items, 0);
    assert!(filtered.items.is_empty());

    test.cleanup().await;
}

#[tokio::test]
async fn comments_keep_the_counter_in_sync() {
    let Some(test) = TestDb::connect().await else {
        return;
    };
    let idea = test.insert_idea("Discussed", 0, 1_000).await;
    let carol = user("user_carol");
    let content = CommentContent::new("  Nice one  ".to_owned()).unwrap();

    let comment = test
        .db
        .create_comment(idea, &carol, &content)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(comment.content.get(), "Nice one");
    assert_eq!(comment.idea_id, idea);
    assert_eq!(test.db.fetch_idea(idea).await.unwrap().unwrap().comments_count, 1);

    assert_eq!(
        test.db.create_comment(Id::generate(), &carol, &content).await.unwrap(),
        None
    );

    let page = test
        .db
        .fetch_idea_comments(idea, PageRequest::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].id, comment.id);

    assert_eq!(
        test.db.delete_comment(idea, comment.id, &user("user_dave")).await.unwrap(),
        CommentDeletion::NotAuthor
    );
    assert_eq!(
        test.db.delete_comment(idea, comment.id, &carol).await.unwrap(),
        CommentDeletion::Deleted
    );
    assert_eq!(
        test.db.delete_comment(idea, comment.id, &carol).await.unwrap(),
        CommentDeletion::NotFound
    );
    assert_eq!(test.db.fetch_idea(idea).await.unwrap().unwrap().comments_count, 0);

    test.cleanup().await;
}

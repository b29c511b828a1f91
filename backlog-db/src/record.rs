use backlog_common::model::{
    ModelValidationError,
    comment::{Comment, CommentContent},
    idea::Idea,
    project::Project,
    user::UserId,
};
use bson::{Bson, DateTime, Document, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub(crate) struct IdeaRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub difficulty: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub author_id: String,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Document>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub(crate) struct LikeRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub idea_id: ObjectId,
    pub created_at: DateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub(crate) struct BookmarkRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub idea_id: ObjectId,
    pub created_at: DateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub(crate) struct CommentRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub idea_id: ObjectId,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub(crate) struct ProjectRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl LikeRecord {
    pub fn new(user_id: String, idea_id: ObjectId) -> Self {
        Self {
            id: None,
            user_id,
            idea_id,
            created_at: DateTime::now(),
        }
    }
}

impl BookmarkRecord {
    pub fn new(user_id: String, idea_id: ObjectId) -> Self {
        Self {
            id: None,
            user_id,
            idea_id,
            created_at: DateTime::now(),
        }
    }
}

impl CommentRecord {
    pub fn new(idea_id: ObjectId, user_id: String, content: String) -> Self {
        let now = DateTime::now();

        Self {
            id: ObjectId::new(),
            idea_id,
            user_id,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

fn counter(value: i64) -> Result<u64, ModelValidationError> {
    u64::try_from(value).map_err(|_| ModelValidationError::NegativeCounter(value))
}

impl TryFrom<IdeaRecord> for Idea {
    type Error = ModelValidationError;

    fn try_from(value: IdeaRecord) -> Result<Self, Self::Error> {
        let details = value
            .details
            .map(|details| match Bson::Document(details).into_relaxed_extjson() {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            });

        Ok(Self {
            id: value.id.into(),
            title: value.title,
            description: value.description,
            tags: value.tags.unwrap_or_default(),
            difficulty: value.difficulty.into(),
            created_at: value.created_at.to_time_0_3(),
            updated_at: value.updated_at.to_time_0_3(),
            author_id: UserId::new(value.author_id)?,
            likes_count: counter(value.likes_count)?,
            comments_count: counter(value.comments_count)?,
            details,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            idea_id: value.idea_id.into(),
            user_id: UserId::new(value.user_id)?,
            content: CommentContent::new(value.content)?,
            created_at: value.created_at.to_time_0_3(),
            updated_at: value.updated_at.to_time_0_3(),
        })
    }
}

impl From<ProjectRecord> for Project {
    fn from(value: ProjectRecord) -> Self {
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
        }
    }
}

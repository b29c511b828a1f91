use crate::model::{Id, idea::IdeaMarker, user::UserId};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const COMMENT_CONTENT_MAX_LEN: usize = 2000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub idea_id: Id<IdeaMarker>,
    pub user_id: UserId,
    pub content: CommentContent,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Comment text, trimmed, between 1 and [`COMMENT_CONTENT_MAX_LEN`] characters.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentContent(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The comment must be between 1 and {} characters long", COMMENT_CONTENT_MAX_LEN)]
pub struct InvalidCommentContentError(String);

impl CommentContent {
    pub fn new(content: String) -> Result<Self, InvalidCommentContentError> {
        let trimmed = content.trim();
        let len = trimmed.chars().count();

        if (1..=COMMENT_CONTENT_MAX_LEN).contains(&len) {
            Ok(CommentContent(trimmed.to_owned()))
        } else {
            Err(InvalidCommentContentError(content))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CommentContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentContent::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"CommentContent"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::comment::{COMMENT_CONTENT_MAX_LEN, CommentContent};

    #[test]
    fn content_is_trimmed() {
        let content = CommentContent::new("  nice idea \n".to_owned()).unwrap();
        assert_eq!(content.get(), "nice idea");
    }

    #[test]
    fn content_bounds() {
        assert!(CommentContent::new(String::new()).is_err());
        assert!(CommentContent::new(" \t\n".to_owned()).is_err());
        assert!(CommentContent::new("ä".repeat(COMMENT_CONTENT_MAX_LEN)).is_ok());
        assert!(CommentContent::new("a".repeat(COMMENT_CONTENT_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn content_validates_on_deserialize() {
        assert!(serde_json::from_str::<CommentContent>(r#""hello""#).is_ok());
        assert!(serde_json::from_str::<CommentContent>(r#""   ""#).is_err());
    }
}

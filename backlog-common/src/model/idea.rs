use crate::model::{Id, user::UserId};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct IdeaMarker;

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Idea {
    pub id: Id<IdeaMarker>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub author_id: UserId,
    pub likes_count: u64,
    pub comments_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

/// How hard an idea is to build.
///
/// Ideas are seeded from outside this service, so stored values outside the
/// usual three are kept as [`Difficulty::Other`] and matched exactly.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Other(String),
}

pub const MAX_DIFFICULTY_LEN: usize = 64;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown difficulty: {0:?}")]
pub struct InvalidDifficultyError(String);

impl Difficulty {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Other(other) => other,
        }
    }
}

impl From<String> for Difficulty {
    fn from(value: String) -> Self {
        match value.as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Other(value),
        }
    }
}

impl From<Difficulty> for String {
    fn from(value: Difficulty) -> Self {
        match value {
            Difficulty::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a requested difficulty. Blank, overlong or control character
/// values are rejected, anything else is matched as is.
impl FromStr for Difficulty {
    type Err = InvalidDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty()
            || s.chars().count() > MAX_DIFFICULTY_LEN
            || s.chars().any(char::is_control)
        {
            return Err(InvalidDifficultyError(s.to_owned()));
        }

        Ok(Self::from(s.to_owned()))
    }
}

/// Conjunction of predicates applied when listing ideas.
///
/// An empty `tags` set does not restrict the listing; otherwise an idea has to
/// carry at least one of the tags.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct IdeaFilter {
    pub tags: Vec<String>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum IdeaSort {
    /// Newest first.
    #[default]
    Newest,
    /// Most likes, then most comments, then newest.
    Trending,
    /// Most likes.
    Popular,
}

impl IdeaSort {
    /// Unknown or missing sort names fall back to [`IdeaSort::Newest`].
    #[must_use]
    pub fn from_query(sort: Option<&str>) -> Self {
        match sort {
            Some("trending") => IdeaSort::Trending,
            Some("popular") => IdeaSort::Popular,
            _ => IdeaSort::Newest,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::idea::{Difficulty, IdeaSort, MAX_DIFFICULTY_LEN};

    #[test]
    fn known_difficulties_parse_to_variants() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(difficulty.as_str().parse::<Difficulty>(), Ok(difficulty.clone()));
        }
    }

    #[test]
    fn other_difficulties_are_kept_verbatim() {
        let beginner: Difficulty = "beginner".parse().unwrap();
        assert_eq!(beginner, Difficulty::Other("beginner".to_owned()));
        assert_eq!(beginner.as_str(), "beginner");

        // Matching is exact, so case is not folded.
        assert_eq!(
            "Easy".parse::<Difficulty>(),
            Ok(Difficulty::Other("Easy".to_owned()))
        );
        assert_eq!(
            serde_json::to_value(Difficulty::Other("expert".to_owned())).unwrap(),
            "expert"
        );
        assert_eq!(
            serde_json::from_value::<Difficulty>("hard".into()).unwrap(),
            Difficulty::Hard
        );
    }

    #[test]
    fn unusable_difficulties_are_rejected() {
        assert!("   ".parse::<Difficulty>().is_err());
        assert!("hard\n".parse::<Difficulty>().is_err());
        assert!("x".repeat(MAX_DIFFICULTY_LEN + 1).parse::<Difficulty>().is_err());
        assert!("x".repeat(MAX_DIFFICULTY_LEN).parse::<Difficulty>().is_ok());
    }

    #[test]
    fn sort_falls_back_to_newest() {
        assert_eq!(IdeaSort::from_query(None), IdeaSort::Newest);
        assert_eq!(IdeaSort::from_query(Some("")), IdeaSort::Newest);
        assert_eq!(IdeaSort::from_query(Some("random")), IdeaSort::Newest);
        assert_eq!(IdeaSort::from_query(Some("trending")), IdeaSort::Trending);
        assert_eq!(IdeaSort::from_query(Some("popular")), IdeaSort::Popular);
    }
}

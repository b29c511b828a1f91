use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const USER_ID_MAX_LEN: usize = 128;

/// Subject id issued by the authentication provider.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user id is invalid: {0:?}")]
pub struct InvalidUserIdError(String);

impl UserId {
    pub fn new(id: String) -> Result<Self, InvalidUserIdError> {
        if !id.is_empty() && id.len() <= USER_ID_MAX_LEN {
            Ok(UserId(id))
        } else {
            Err(InvalidUserIdError(id))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserId::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserId"))
    }
}

/// A verified caller, as resolved by the authentication provider.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
    pub banned: bool,
}

#[cfg(test)]
mod tests {
    use crate::model::user::{USER_ID_MAX_LEN, UserId};

    #[test]
    fn user_id_bounds() {
        assert!(UserId::new(String::new()).is_err());
        assert!(UserId::new("user_2abc".to_owned()).is_ok());
        assert!(UserId::new("u".repeat(USER_ID_MAX_LEN)).is_ok());
        assert!(UserId::new("u".repeat(USER_ID_MAX_LEN + 1)).is_err());
    }
}

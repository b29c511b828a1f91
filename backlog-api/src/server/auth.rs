use crate::server::ServerError;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use backlog_common::model::user::{Identity, InvalidUserIdError, UserId};
use headers::{Authorization, Cookie, HeaderMapExt, authorization::Bearer};
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "__session";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No session token was provided")]
    MissingToken,
    #[error("The session token is invalid: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("The session token names no signing key")]
    MissingKeyId,
    #[error("No signing key with id {0:?} is known")]
    UnknownKey(String),
    #[error("The authorized party {0:?} is not allowed")]
    UnauthorizedParty(Option<String>),
    #[error("The token subject is not a valid user id: {0}")]
    InvalidSubject(#[from] InvalidUserIdError),
    #[error("The authentication provider could not be reached: {0}")]
    Provider(#[from] reqwest::Error),
}

/// Resolves a session token to the identity it was issued for.
#[async_trait]
pub trait Authenticator: Debug + Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// A caller whose session token was verified for this request.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    identity: Identity,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = match AuthorizationHeader::from_request_parts(parts, state).await {
            Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_owned(),
            Err(rejection) if rejection.is_missing() => parts
                .headers
                .typed_get::<Cookie>()
                .and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_owned))
                .ok_or(AuthError::MissingToken)?,
            Err(rejection) => return Err(ServerError::InvalidAuthorizationHeader(rejection)),
        };

        if token.is_empty() {
            return Err(AuthError::MissingToken.into());
        }

        let identity = Arc::<dyn Authenticator>::from_ref(state)
            .authenticate(&token)
            .await?;

        if identity.banned {
            warn!(user_id = %identity.user_id, "Banned user made an authenticated request");
        } else {
            debug!(user_id = %identity.user_id, "Authenticated request");
        }

        Ok(Self { identity })
    }
}

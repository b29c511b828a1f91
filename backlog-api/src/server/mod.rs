use crate::server::auth::{AuthError, Authenticator};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::{extract::QueryRejection, typed_header::TypedHeaderRejection};
use backlog_common::model::{
    Id,
    comment::{CommentMarker, InvalidCommentContentError},
    idea::{IdeaMarker, InvalidDifficultyError},
};
use backlog_db::client::{DbClient, DbError};
use response::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

pub mod auth;
mod query;
mod response;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub authenticator: Arc<dyn Authenticator>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidDifficulty(#[from] InvalidDifficultyError),
    #[error(transparent)]
    InvalidComment(#[from] InvalidCommentContentError),
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Idea with id {0} was not found.")]
    IdeaNotFound(Id<IdeaMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentNotFound(Id<CommentMarker>),
    #[error("Comment with id {0} belongs to another user.")]
    NotCommentAuthor(Id<CommentMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::IdeaNotFound(_)
            | ServerError::CommentNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::PathRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidDifficulty(_)
            | ServerError::InvalidComment(_) => StatusCode::BAD_REQUEST,
            ServerError::InvalidAuthorizationHeader(_) | ServerError::Authentication(_) => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::NotCommentAuthor(_) => StatusCode::FORBIDDEN,
            ServerError::Database(DbError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::JsonResponse(_) | ServerError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::UnknownRoute(_) => "not_found",
            ServerError::PathRejection(_) => "invalid_id",
            ServerError::QueryRejection(_) => "invalid_query",
            ServerError::JsonRejection(_) => "invalid_body",
            ServerError::InvalidDifficulty(_) => "invalid_difficulty",
            ServerError::InvalidComment(_) => "invalid_comment",
            ServerError::InvalidAuthorizationHeader(_) | ServerError::Authentication(_) => {
                "authentication_failed"
            }
            ServerError::IdeaNotFound(_) => "idea_not_found",
            ServerError::CommentNotFound(_) => "comment_not_found",
            ServerError::NotCommentAuthor(_) => "forbidden",
            ServerError::Database(DbError::Timeout(_)) => "timeout",
            ServerError::JsonResponse(_) | ServerError::Database(_) => "internal_error",
        }
    }

    /// What the client gets to see. Server side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServerError::InvalidAuthorizationHeader(_) | ServerError::Authentication(_) => {
                "Invalid or missing authentication token".to_owned()
            }
            ServerError::Database(DbError::Timeout(_)) => "The request timed out".to_owned(),
            ServerError::JsonResponse(_) | ServerError::Database(_) => {
                "An internal error occurred".to_owned()
            }
            _ => self.to_string(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    error: &'static str,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.code(),
            message: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}

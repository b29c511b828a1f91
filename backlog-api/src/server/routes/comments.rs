use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    query::Query,
    response::{DataResponse, Json, MessageResponse, PagedResponse},
    routes::bookmarks::PageQuery,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use backlog_common::model::{
    Id,
    comment::{Comment, CommentContent, CommentMarker},
    idea::IdeaMarker,
};
use backlog_db::client::{CommentDeletion, DbClient};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_comments)
        .typed_post(add_comment)
        .typed_delete(delete_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ideas/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<IdeaMarker>,
}

async fn list_comments(
    CommentsPath { id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResponse<Comment>>> {
    let request = query.request();
    let page = db
        .fetch_idea_comments(id, request)
        .await?
        .ok_or(ServerError::IdeaNotFound(id))?;

    Ok(PagedResponse::json(page, request))
}

/// The content is validated by hand so that it gets its own error code.
#[derive(Deserialize)]
struct CreateCommentBody {
    content: String,
}

async fn add_comment(
    CommentsPath { id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCommentBody>,
) -> Result<Json<DataResponse<Comment>>> {
    let content = CommentContent::new(body.content)?;

    let comment = db
        .create_comment(id, user.user_id(), &content)
        .await?
        .ok_or(ServerError::IdeaNotFound(id))?;

    info!(idea_id = %id, comment_id = %comment.id, user_id = %user.user_id(), "Comment added");
    Ok(DataResponse::json(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ideas/{id}/comments/{comment_id}", rejection(ServerError))]
struct CommentPath {
    id: Id<IdeaMarker>,
    comment_id: Id<CommentMarker>,
}

async fn delete_comment(
    CommentPath { id, comment_id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    match db.delete_comment(id, comment_id, user.user_id()).await? {
        CommentDeletion::Deleted => Ok(MessageResponse::json("Comment deleted successfully")),
        CommentDeletion::NotFound => Err(ServerError::CommentNotFound(comment_id)),
        CommentDeletion::NotAuthor => Err(ServerError::NotCommentAuthor(comment_id)),
    }
}

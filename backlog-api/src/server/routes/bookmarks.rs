use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    query::Query,
    response::{Json, MessageResponse, PagedResponse},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use backlog_common::{
    model::{
        Id,
        idea::{Idea, IdeaMarker},
    },
    pagination::PageRequest,
};
use backlog_db::client::{DbClient, Toggle};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_bookmarked_ideas)
        .typed_post(bookmark_idea)
        .typed_delete(unbookmark_idea)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub(super) struct PageQuery {
    page: Option<String>,
    size: Option<String>,
}

impl PageQuery {
    pub(super) fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.size.as_deref())
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ideas/bookmarks", rejection(ServerError))]
struct BookmarksPath();

async fn list_bookmarked_ideas(
    BookmarksPath(): BookmarksPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResponse<Idea>>> {
    let request = query.request();
    let page = db.fetch_bookmarked_ideas(user.user_id(), request).await?;

    Ok(PagedResponse::json(page, request))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ideas/{id}/bookmark", rejection(ServerError))]
struct BookmarkPath {
    id: Id<IdeaMarker>,
}

async fn bookmark_idea(
    BookmarkPath { id }: BookmarkPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    let toggle = db
        .bookmark_idea(user.user_id(), id)
        .await?
        .ok_or(ServerError::IdeaNotFound(id))?;

    Ok(MessageResponse::json(match toggle {
        Toggle::Changed => "Idea bookmarked successfully",
        Toggle::Unchanged => "Already bookmarked",
    }))
}

async fn unbookmark_idea(
    BookmarkPath { id }: BookmarkPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    let toggle = db.unbookmark_idea(user.user_id(), id).await?;

    Ok(MessageResponse::json(match toggle {
        Toggle::Changed => "Idea unbookmarked successfully",
        Toggle::Unchanged => "Bookmark not found",
    }))
}

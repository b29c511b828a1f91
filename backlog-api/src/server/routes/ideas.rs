use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    query::Query,
    response::{DataResponse, Json, MessageResponse, PagedResponse},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use backlog_common::{
    model::{
        Id,
        idea::{Difficulty, Idea, IdeaFilter, IdeaMarker, IdeaSort},
    },
    pagination::PageRequest,
};
use backlog_db::client::{DbClient, Toggle};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_ideas)
        .typed_get(get_idea)
        .typed_post(like_idea)
        .typed_delete(unlike_idea)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ideas", rejection(ServerError))]
struct ListIdeasPath();

/// Every value stays a string so that malformed paging falls back to defaults.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct ListIdeasQuery {
    #[serde(default, alias = "tags[]")]
    tags: Vec<String>,
    difficulty: Option<String>,
    sort: Option<String>,
    page: Option<String>,
    size: Option<String>,
}

impl ListIdeasQuery {
    fn filter(&self) -> Result<IdeaFilter> {
        let tags = self
            .tags
            .iter()
            .filter(|tag| !tag.is_empty())
            .cloned()
            .collect();
        let difficulty = self
            .difficulty
            .as_deref()
            .filter(|difficulty| !difficulty.is_empty())
            .map(str::parse::<Difficulty>)
            .transpose()?;

        Ok(IdeaFilter { tags, difficulty })
    }
}

async fn list_ideas(
    ListIdeasPath(): ListIdeasPath,
    State(db): State<Arc<DbClient>>,
    Query(query): Query<ListIdeasQuery>,
) -> Result<Json<PagedResponse<Idea>>> {
    let filter = query.filter()?;
    let sort = IdeaSort::from_query(query.sort.as_deref());
    let request = PageRequest::parse(query.page.as_deref(), query.size.as_deref());

    let page = db.fetch_ideas(&filter, sort, request).await?;

    Ok(PagedResponse::json(page, request))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ideas/{id}", rejection(ServerError))]
struct GetIdeaPath {
    id: Id<IdeaMarker>,
}

async fn get_idea(
    GetIdeaPath { id }: GetIdeaPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<DataResponse<Idea>>> {
    let idea = db
        .fetch_idea(id)
        .await?
        .ok_or(ServerError::IdeaNotFound(id))?;

    Ok(DataResponse::json(idea))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ideas/{id}/like", rejection(ServerError))]
struct LikePath {
    id: Id<IdeaMarker>,
}

async fn like_idea(
    LikePath { id }: LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    let toggle = db
        .like_idea(user.user_id(), id)
        .await?
        .ok_or(ServerError::IdeaNotFound(id))?;

    Ok(MessageResponse::json(match toggle {
        Toggle::Changed => "Idea liked successfully",
        Toggle::Unchanged => "Idea already liked",
    }))
}

async fn unlike_idea(
    LikePath { id }: LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    db.unlike_idea(user.user_id(), id).await?;

    Ok(MessageResponse::json("Idea unliked successfully"))
}

use crate::server::{
    Result, ServerError, ServerRouter,
    response::{DataResponse, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use backlog_common::model::project::Project;
use backlog_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(list_projects)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/projects", rejection(ServerError))]
struct ProjectsPath();

async fn list_projects(
    ProjectsPath(): ProjectsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<DataResponse<Vec<Project>>>> {
    let projects = db.fetch_projects().await?;

    Ok(DataResponse::json(projects))
}

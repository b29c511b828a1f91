use crate::server::ServerRouter;
use axum::Router;

mod bookmarks;
mod comments;
mod health;
mod ideas;
mod projects;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(health::routes())
        .merge(ideas::routes())
        .merge(bookmarks::routes())
        .merge(comments::routes())
        .merge(projects::routes())
}

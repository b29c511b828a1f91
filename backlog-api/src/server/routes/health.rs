use crate::server::{ServerError, ServerRouter, response::Json};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(health)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/health", rejection(ServerError))]
struct HealthPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn health(HealthPath(): HealthPath) -> Json<Health> {
    Json(Health {
        status: "ok",
        service: "backlog-backend",
    })
}

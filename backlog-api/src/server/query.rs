use crate::server::ServerError;
use axum::extract::FromRequestParts;
use axum_extra::extract::Query as ExtraQuery;

/// Query string extractor that accepts repeated keys and rejects with [`ServerError`].
#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(ExtraQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

//! Response bodies shared by the routes.

use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use backlog_common::pagination::{Page, PageRequest, Pagination};
use headers::ContentType;
use serde::Serialize;

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// `{"data": ...}`
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn json(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

/// `{"data": [...], "pagination": {...}}`
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PagedResponse<T> {
    pub fn json(page: Page<T>, request: PageRequest) -> Json<Self> {
        Json(Self {
            pagination: Pagination::new(request, page.total_items),
            data: page.items,
        })
    }
}

/// `{"message": "..."}`, the reply to mutations.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn json(message: &'static str) -> Json<Self> {
        Json(Self { message })
    }
}

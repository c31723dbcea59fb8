//! Book request endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        request::{BookRequestView, CreateBookRequest},
        BookRequest,
    },
    AppState,
};

use super::{AppJson, AuthenticatedUser};

#[derive(Serialize, ToSchema)]
pub struct ClearRequestsResponse {
    pub success: bool,
    pub cleared: u64,
}

/// Ask the library for a title that is not currently available
#[utoipa::path(
    post,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Request counted", body = BookRequest),
        (status = 409, description = "Title is available to borrow", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<CreateBookRequest>,
) -> AppResult<(StatusCode, Json<BookRequest>)> {
    request.validate()?;

    let requester = request.borrower_id.clone().unwrap_or_else(|| claims.sub.clone());
    claims.require_self_or_staff(&requester)?;

    let recorded = state
        .services
        .requests
        .submit(&request, &requester, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// Requested titles, most wanted first
#[utoipa::path(
    get,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Request tally", body = Vec<BookRequestView>)
    )
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookRequestView>>> {
    claims.require_staff()?;
    let requests = state.services.requests.list().await?;
    Ok(Json(requests))
}

/// Drop every request
#[utoipa::path(
    delete,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Requests cleared", body = ClearRequestsResponse)
    )
)]
pub async fn clear_requests(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ClearRequestsResponse>> {
    claims.require_staff()?;
    let cleared = state.services.requests.clear().await?;
    Ok(Json(ClearRequestsResponse {
        success: true,
        cleared,
    }))
}

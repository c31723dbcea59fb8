//! Staff broadcast endpoint

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{error::AppResult, AppState};

use super::{AppJson, AuthenticatedUser};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BroadcastRequest {
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    /// Department labels or codes; empty means every borrower
    #[serde(default)]
    pub departments: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BroadcastResponse {
    pub success: bool,
    /// Number of notifications queued
    pub queued: usize,
}

/// Email a message to borrowers
#[utoipa::path(
    post,
    path = "/notifications/broadcast",
    tag = "notifications",
    security(("bearer_auth" = [])),
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Notifications queued", body = BroadcastResponse),
        (status = 400, description = "Empty message", body = crate::error::ErrorResponse)
    )
)]
pub async fn broadcast(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<BroadcastRequest>,
) -> AppResult<Json<BroadcastResponse>> {
    claims.require_staff()?;
    request.validate()?;

    let queued = state
        .services
        .borrowers
        .broadcast(&request.message, &request.departments)
        .await?;
    Ok(Json(BroadcastResponse {
        success: true,
        queued,
    }))
}

//! Feedback endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppResult,
    models::feedback::{CreateFeedback, Feedback, FeedbackQuery},
    AppState,
};

use super::{AppJson, AuthenticatedUser};

/// Leave feedback for the library
#[utoipa::path(
    post,
    path = "/feedback",
    tag = "feedback",
    security(("bearer_auth" = [])),
    request_body = CreateFeedback,
    responses(
        (status = 201, description = "Feedback stored", body = Feedback),
        (status = 400, description = "Empty message", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    AppJson(request): AppJson<CreateFeedback>,
) -> AppResult<(StatusCode, Json<Feedback>)> {
    request.validate()?;
    let feedback = state.services.feedback.submit(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// Feedback within a time range, newest first
#[utoipa::path(
    get,
    path = "/feedback",
    tag = "feedback",
    security(("bearer_auth" = [])),
    params(FeedbackQuery),
    responses(
        (status = 200, description = "Feedback", body = Vec<Feedback>)
    )
)]
pub async fn list_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<FeedbackQuery>,
) -> AppResult<Json<Vec<Feedback>>> {
    claims.require_staff()?;
    let feedback = state
        .services
        .feedback
        .list(query.range, Utc::now())
        .await?;
    Ok(Json(feedback))
}

//! Borrower endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        borrower::{BorrowerDetails, CreateBorrower},
        ArchivedLoan, Borrower,
    },
    AppState,
};

use super::{AppJson, AuthenticatedUser};

#[derive(Debug, Deserialize, IntoParams)]
pub struct BorrowerQuery {
    /// Department label or code, e.g. `"Computer Science (CSE)"` or `"cse"`
    pub department: Option<String>,
}

/// Register a borrower
#[utoipa::path(
    post,
    path = "/borrowers",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    request_body = CreateBorrower,
    responses(
        (status = 201, description = "Borrower registered", body = Borrower),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 409, description = "Borrower id or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register_borrower(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<CreateBorrower>,
) -> AppResult<(StatusCode, Json<Borrower>)> {
    claims.require_staff()?;
    request.validate()?;

    let borrower = state.services.borrowers.register(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(borrower)))
}

/// List borrowers
#[utoipa::path(
    get,
    path = "/borrowers",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    params(BorrowerQuery),
    responses(
        (status = 200, description = "Borrowers", body = Vec<Borrower>)
    )
)]
pub async fn list_borrowers(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowerQuery>,
) -> AppResult<Json<Vec<Borrower>>> {
    claims.require_staff()?;
    let borrowers = state
        .services
        .borrowers
        .list(query.department.as_deref())
        .await?;
    Ok(Json(borrowers))
}

/// Borrower with held copies and the fines accruing on them
#[utoipa::path(
    get,
    path = "/borrowers/{id}",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Borrower id")
    ),
    responses(
        (status = 200, description = "Borrower details", body = BorrowerDetails),
        (status = 404, description = "Borrower not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_borrower(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<BorrowerDetails>> {
    claims.require_self_or_staff(&id)?;
    let details = state.services.borrowers.details(&id, Utc::now()).await?;
    Ok(Json(details))
}

/// Returned loans of a borrower, newest first
#[utoipa::path(
    get,
    path = "/borrowers/{id}/history",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Borrower id")
    ),
    responses(
        (status = 200, description = "Borrowing history", body = Vec<ArchivedLoan>),
        (status = 404, description = "Borrower not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ArchivedLoan>>> {
    claims.require_self_or_staff(&id)?;
    let history = state.services.borrowers.history(&id).await?;
    Ok(Json(history))
}

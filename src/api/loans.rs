//! Loan endpoints: issue, return and the active loan ledger

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::{IssueRequest, LedgerEntry, ReturnReceipt, ReturnRequest},
        Loan,
    },
    AppState,
};

use super::{AppJson, AuthenticatedUser};

#[derive(Serialize, ToSchema)]
pub struct IssueResponse {
    pub success: bool,
    pub loan: Loan,
}

#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub success: bool,
    #[serde(flatten)]
    pub receipt: ReturnReceipt,
}

/// Issue a copy to a borrower
#[utoipa::path(
    post,
    path = "/loans/issue",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = IssueRequest,
    responses(
        (status = 201, description = "Loan created", body = IssueResponse),
        (status = 400, description = "Missing borrower id, copy number or ISBN", body = crate::error::ErrorResponse),
        (status = 403, description = "Loan limit reached or caller is not staff", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrower or title not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Copy unavailable, already issued, or title already held", body = crate::error::ErrorResponse)
    )
)]
pub async fn issue_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<IssueRequest>,
) -> AppResult<(StatusCode, Json<IssueResponse>)> {
    claims.require_staff()?;
    request.validate()?;

    let loan = state.services.loans.issue(&request).await?;
    Ok((
        StatusCode::CREATED,
        Json(IssueResponse {
            success: true,
            loan,
        }),
    ))
}

/// Return an issued copy
#[utoipa::path(
    put,
    path = "/loans/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Copy returned with the fine assessed", body = ReturnResponse),
        (status = 400, description = "Missing borrower id or copy number", body = crate::error::ErrorResponse),
        (status = 404, description = "No such active loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<ReturnRequest>,
) -> AppResult<Json<ReturnResponse>> {
    claims.require_staff()?;
    request.validate()?;

    let receipt = state.services.loans.return_copy(&request).await?;
    Ok(Json(ReturnResponse {
        success: true,
        receipt,
    }))
}

/// Every active loan with borrower and title details
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Issued copies", body = Vec<LedgerEntry>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    claims.require_staff()?;
    let ledger = state.services.loans.ledger(Utc::now()).await?;
    Ok(Json(ledger))
}

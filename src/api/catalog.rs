//! Catalog endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        title::{AddCopiesOutcome, AddCopiesRequest, CopyRemoval, DeleteCopiesRequest, TitleView},
        Title,
    },
    AppState,
};

use super::{AppJson, AuthenticatedUser};

/// Add-copies response. `duplicate` is set when the ISBN exists and the
/// request must be resubmitted with `confirmed: true`.
#[derive(Serialize, ToSchema)]
pub struct AddCopiesResponse {
    pub success: bool,
    pub duplicate: bool,
    #[serde(flatten)]
    pub outcome: AddCopiesOutcome,
}

/// Delete response. A deletion touching issued copies is reported with
/// `success: false` and the offending copy numbers.
#[derive(Serialize, ToSchema)]
pub struct DeleteCopiesResponse {
    pub success: bool,
    pub deleted: bool,
    /// The title itself was removed because no copies were left
    pub title_deleted: bool,
    pub removed: Vec<String>,
    pub title: Option<Title>,
    pub rejected: Option<String>,
    pub issued_copies: Vec<String>,
}

/// List every title with its availability
#[utoipa::path(
    get,
    path = "/catalog",
    tag = "catalog",
    responses(
        (status = 200, description = "Catalog titles", body = Vec<TitleView>)
    )
)]
pub async fn list_titles(State(state): State<AppState>) -> AppResult<Json<Vec<TitleView>>> {
    let titles = state.services.catalog.list().await?;
    Ok(Json(titles))
}

/// Get one title by ISBN
#[utoipa::path(
    get,
    path = "/catalog/{isbn}",
    tag = "catalog",
    params(
        ("isbn" = String, Path, description = "Title ISBN")
    ),
    responses(
        (status = 200, description = "Title", body = TitleView),
        (status = 404, description = "Title not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> AppResult<Json<TitleView>> {
    let title = state.services.catalog.get(&isbn).await?;
    Ok(Json(title.into()))
}

/// Catalogue a new title or add copies to an existing one
#[utoipa::path(
    post,
    path = "/catalog/add",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = AddCopiesRequest,
    responses(
        (status = 200, description = "Title created, copies merged, or duplicate awaiting confirmation", body = AddCopiesResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_copies(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<AddCopiesRequest>,
) -> AppResult<Json<AddCopiesResponse>> {
    claims.require_staff()?;
    request.validate()?;

    let outcome = state.services.catalog.add_copies(&request).await?;
    Ok(Json(AddCopiesResponse {
        success: true,
        duplicate: matches!(outcome, AddCopiesOutcome::Duplicate { .. }),
        outcome,
    }))
}

/// Delete selected copies or a whole title
#[utoipa::path(
    post,
    path = "/catalog/delete",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = DeleteCopiesRequest,
    responses(
        (status = 200, description = "Copies deleted, or deletion rejected because copies are issued", body = DeleteCopiesResponse),
        (status = 404, description = "Title not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_copies(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<DeleteCopiesRequest>,
) -> AppResult<Json<DeleteCopiesResponse>> {
    claims.require_staff()?;

    let response = match state.services.catalog.delete(&request, Utc::now()).await {
        Ok(CopyRemoval::TitleDeleted { removed, .. }) => DeleteCopiesResponse {
            success: true,
            deleted: true,
            title_deleted: true,
            removed,
            title: None,
            rejected: None,
            issued_copies: Vec::new(),
        },
        Ok(CopyRemoval::CopiesRemoved { title, removed }) => DeleteCopiesResponse {
            success: true,
            deleted: true,
            title_deleted: false,
            removed,
            title: Some(title),
            rejected: None,
            issued_copies: Vec::new(),
        },
        Err(AppError::CopiesIssued { copies }) => DeleteCopiesResponse {
            success: false,
            deleted: false,
            title_deleted: false,
            removed: Vec::new(),
            title: None,
            rejected: Some(format!(
                "Cannot delete issued copies: {}",
                copies.join(", ")
            )),
            issued_copies: copies,
        },
        Err(e) => return Err(e),
    };

    Ok(Json(response))
}

//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric codes returned alongside every error message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchBorrower = 4,
    NoSuchTitle = 5,
    NoSuchLoan = 6,
    CopyNotAvailable = 7,
    CopyAlreadyIssued = 8,
    MaxLoansReached = 9,
    TitleAlreadyBorrowed = 10,
    CopiesIssued = 11,
    Duplicate = 12,
    BadValue = 13,
}

/// Which record a `NotFound` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Borrower,
    Title,
    Loan,
    Other,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {1}")]
    NotFound(Entity, String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Copy {copy} is not available")]
    CopyUnavailable { copy: String },

    #[error("Copy {copy} is already issued")]
    AlreadyIssued { copy: String },

    #[error("Borrower already holds a copy of {isbn}")]
    DuplicateTitle { isbn: String },

    #[error("Maximum loans reached ({held}/{max})")]
    LoanLimitExceeded { held: usize, max: usize },

    #[error("Copies currently issued: {}", copies.join(", "))]
    CopiesIssued { copies: Vec<String> },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn borrower_not_found(id: &str) -> Self {
        AppError::NotFound(Entity::Borrower, format!("Borrower {} not found", id))
    }

    pub fn title_not_found(isbn: &str) -> Self {
        AppError::NotFound(Entity::Title, format!("Title with ISBN {} not found", isbn))
    }

    pub fn loan_not_found(borrower_id: &str, copy: &str) -> Self {
        AppError::NotFound(
            Entity::Loan,
            format!("No active loan of copy {} for borrower {}", copy, borrower_id),
        )
    }

    /// HTTP status and error code for this error
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(entity, _) => {
                let code = match entity {
                    Entity::Borrower => ErrorCode::NoSuchBorrower,
                    Entity::Title => ErrorCode::NoSuchTitle,
                    Entity::Loan => ErrorCode::NoSuchLoan,
                    Entity::Other => ErrorCode::Failure,
                };
                (StatusCode::NOT_FOUND, code)
            }
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::CopyUnavailable { .. } => (StatusCode::CONFLICT, ErrorCode::CopyNotAvailable),
            AppError::AlreadyIssued { .. } => (StatusCode::CONFLICT, ErrorCode::CopyAlreadyIssued),
            AppError::DuplicateTitle { .. } => {
                (StatusCode::CONFLICT, ErrorCode::TitleAlreadyBorrowed)
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::LoanLimitExceeded { .. } => (StatusCode::FORBIDDEN, ErrorCode::MaxLoansReached),
            AppError::CopiesIssued { .. } => (StatusCode::FORBIDDEN, ErrorCode::CopiesIssued),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value for {}", field),
                })
            })
            .collect();
        AppError::Validation(messages.join("; "))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::NotFound(_, msg)
            | AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            success: false,
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        let cases = [
            (AppError::borrower_not_found("S1"), StatusCode::NOT_FOUND),
            (AppError::CopyUnavailable { copy: "C1".into() }, StatusCode::CONFLICT),
            (AppError::AlreadyIssued { copy: "C1".into() }, StatusCode::CONFLICT),
            (AppError::DuplicateTitle { isbn: "978-0".into() }, StatusCode::CONFLICT),
            (AppError::LoanLimitExceeded { held: 3, max: 3 }, StatusCode::FORBIDDEN),
            (AppError::CopiesIssued { copies: vec!["C1".into()] }, StatusCode::FORBIDDEN),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_and_code().0, status, "{}", error);
        }
    }

    #[test]
    fn not_found_code_depends_on_entity() {
        assert_eq!(
            AppError::title_not_found("978-0").status_and_code().1,
            ErrorCode::NoSuchTitle
        );
        assert_eq!(
            AppError::loan_not_found("S1", "C1").status_and_code().1,
            ErrorCode::NoSuchLoan
        );
    }

    #[test]
    fn issued_copies_are_listed_in_message() {
        let error = AppError::CopiesIssued {
            copies: vec!["BN1-01".into(), "BN1-02".into()],
        };
        assert_eq!(error.to_string(), "Copies currently issued: BN1-01, BN1-02");
    }
}

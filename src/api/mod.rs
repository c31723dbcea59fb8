//! API handlers for the circulation REST endpoints

pub mod borrowers;
pub mod catalog;
pub mod feedback;
pub mod health;
pub mod loans;
pub mod notifications;
pub mod openapi;
pub mod requests;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::UserClaims, AppState};

/// JSON body extractor whose rejections render as `ErrorResponse` (400)
/// instead of axum's plain-text 422
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Extractor for the caller identity carried by a bearer JWT
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog
        .route("/catalog", get(catalog::list_titles))
        .route("/catalog/add", post(catalog::add_copies))
        .route("/catalog/delete", post(catalog::delete_copies))
        .route("/catalog/:isbn", get(catalog::get_title))
        // Loans
        .route("/loans", get(loans::list_loans))
        .route("/loans/issue", post(loans::issue_copy))
        .route("/loans/return", put(loans::return_copy))
        // Borrowers
        .route(
            "/borrowers",
            get(borrowers::list_borrowers).post(borrowers::register_borrower),
        )
        .route("/borrowers/:id", get(borrowers::get_borrower))
        .route("/borrowers/:id/history", get(borrowers::get_history))
        // Book requests
        .route(
            "/requests",
            get(requests::list_requests)
                .post(requests::submit_request)
                .delete(requests::clear_requests),
        )
        // Feedback
        .route(
            "/feedback",
            get(feedback::list_feedback).post(feedback::submit_feedback),
        )
        // Notifications
        .route("/notifications/broadcast", post(notifications::broadcast))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

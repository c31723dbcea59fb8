//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{borrowers, catalog, feedback, health, loans, notifications, requests};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "University library catalog copies, issue and return, fines and notifications",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Catalog
        catalog::list_titles,
        catalog::get_title,
        catalog::add_copies,
        catalog::delete_copies,
        // Loans
        loans::issue_copy,
        loans::return_copy,
        loans::list_loans,
        // Borrowers
        borrowers::register_borrower,
        borrowers::list_borrowers,
        borrowers::get_borrower,
        borrowers::get_history,
        // Requests
        requests::submit_request,
        requests::list_requests,
        requests::clear_requests,
        // Feedback
        feedback::submit_feedback,
        feedback::list_feedback,
        // Notifications
        notifications::broadcast,
    ),
    components(
        schemas(
            // Catalog
            crate::models::title::Title,
            crate::models::title::TitleView,
            crate::models::title::TitleStatus,
            crate::models::title::ShelfLocation,
            crate::models::title::AddCopiesRequest,
            crate::models::title::AddCopiesOutcome,
            crate::models::title::DeleteCopiesRequest,
            crate::models::title::CopyRemoval,
            catalog::AddCopiesResponse,
            catalog::DeleteCopiesResponse,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::ArchivedLoan,
            crate::models::loan::IssueRequest,
            crate::models::loan::ReturnRequest,
            crate::models::loan::ReturnReceipt,
            crate::models::loan::LedgerEntry,
            loans::IssueResponse,
            loans::ReturnResponse,
            // Borrowers
            crate::models::borrower::Borrower,
            crate::models::borrower::BorrowedCopy,
            crate::models::borrower::CreateBorrower,
            crate::models::borrower::HeldCopy,
            crate::models::borrower::BorrowerDetails,
            // Requests
            crate::models::request::BookRequest,
            crate::models::request::BookRequestView,
            crate::models::request::CreateBookRequest,
            requests::ClearRequestsResponse,
            // Feedback
            crate::models::feedback::Feedback,
            crate::models::feedback::FeedbackAuthor,
            crate::models::feedback::CreateFeedback,
            crate::models::feedback::FeedbackRange,
            // Notifications
            notifications::BroadcastRequest,
            notifications::BroadcastResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "catalog", description = "Titles and their physical copies"),
        (name = "loans", description = "Issue, return and active loans"),
        (name = "borrowers", description = "Borrower records and history"),
        (name = "requests", description = "Book request tally"),
        (name = "feedback", description = "Reader feedback"),
        (name = "notifications", description = "Staff broadcasts")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

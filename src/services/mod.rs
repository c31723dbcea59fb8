//! Business logic services

pub mod borrowers;
pub mod catalog;
pub mod email;
pub mod feedback;
pub mod loans;
pub mod notifications;
pub mod requests;

use crate::{error::AppResult, models::LoanPolicy, repository::Repository};

use notifications::Notifier;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub borrowers: borrowers::BorrowersService,
    pub requests: requests::RequestsService,
    pub feedback: feedback::FeedbackService,
    store: Repository,
}

impl Services {
    /// Create all services over one store and one notification queue
    pub fn new(repository: Repository, policy: LoanPolicy, notifier: Notifier) -> Self {
        let requests = requests::RequestsService::new(repository.clone(), notifier.clone());
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), requests.clone()),
            loans: loans::LoansService::new(
                repository.clone(),
                policy,
                requests.clone(),
                notifier.clone(),
            ),
            borrowers: borrowers::BorrowersService::new(repository.clone(), policy, notifier),
            feedback: feedback::FeedbackService::new(repository.clone()),
            requests,
            store: repository,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}

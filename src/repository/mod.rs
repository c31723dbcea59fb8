//! Repository layer: the single writer boundary for titles, loans and borrowers

pub mod borrowers;
pub mod feedback;
pub mod loans;
pub mod memory;
pub mod requests;
pub mod titles;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        feedback::Feedback,
        title::{CopyRemoval, CopySelection},
        ArchivedLoan, BookRequest, Borrower, Loan, LoanPolicy, Title,
    },
};

pub use memory::MemoryStore;

/// Shared handle to whichever store backs the services
pub type Repository = Arc<dyn LibraryStore>;

/// Effects of a committed return
#[derive(Debug, Clone)]
pub struct ReturnCommit {
    pub archived: ArchivedLoan,
    /// Title after the copy went back on the shelf, if the title still exists
    pub title: Option<Title>,
}

/// Persistence operations.
///
/// `commit_issue`, `commit_return`, `merge_copies` and `remove_copies` each
/// mutate several records and must be atomic: they either apply every change
/// or none. At most one loan may exist per copy number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    // Titles
    async fn get_title(&self, isbn: &str) -> AppResult<Option<Title>>;
    async fn list_titles(&self) -> AppResult<Vec<Title>>;
    /// Case-insensitive lookup by title and author
    async fn find_title(&self, title: &str, author: &str) -> AppResult<Option<Title>>;
    /// Insert a new title; `Conflict` if the ISBN exists
    async fn create_title(&self, title: &Title) -> AppResult<()>;
    /// Union new copy numbers into the title; returns the title and the copies added
    async fn merge_copies(
        &self,
        isbn: &str,
        copies: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<(Title, Vec<String>)>;
    /// Remove copies, rejecting issued ones; deletes the title once empty
    async fn remove_copies(
        &self,
        isbn: &str,
        selection: &CopySelection,
        now: DateTime<Utc>,
    ) -> AppResult<CopyRemoval>;

    // Borrowers
    async fn get_borrower(&self, id: &str) -> AppResult<Option<Borrower>>;
    async fn list_borrowers(&self) -> AppResult<Vec<Borrower>>;
    /// Insert a new borrower; `Conflict` if the id or email is taken
    async fn create_borrower(&self, borrower: &Borrower) -> AppResult<()>;

    // Loans
    async fn get_loan(&self, copy_number: &str) -> AppResult<Option<Loan>>;
    async fn list_loans(&self) -> AppResult<Vec<Loan>>;
    /// Create the loan, move the copy to issued and record it on the borrower
    async fn commit_issue(&self, loan: &Loan, max_loans: usize) -> AppResult<Title>;
    /// Remove the loan, archive it, shelve the copy and settle the borrower
    async fn commit_return(
        &self,
        borrower_id: &str,
        copy_number: &str,
        returned_at: DateTime<Utc>,
        policy: &LoanPolicy,
    ) -> AppResult<ReturnCommit>;
    /// Archived loans of one borrower, newest first
    async fn loan_history(&self, borrower_id: &str) -> AppResult<Vec<ArchivedLoan>>;

    // Book requests (keys are already normalized)
    async fn record_request(
        &self,
        title: &str,
        author: &str,
        requester: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BookRequest>;
    /// Sorted by count then most recently updated
    async fn list_requests(&self) -> AppResult<Vec<BookRequest>>;
    /// Remove and return the tally row, so only one caller resolves it
    async fn take_request(&self, title: &str, author: &str) -> AppResult<Option<BookRequest>>;
    async fn clear_requests(&self) -> AppResult<u64>;

    // Feedback
    async fn insert_feedback(&self, feedback: &Feedback) -> AppResult<()>;
    /// Newest first
    async fn list_feedback(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<Feedback>>;
}

/// PostgreSQL-backed store holding one repository per table group
#[derive(Clone)]
pub struct PgStore {
    pub pool: Pool<Postgres>,
    pub titles: titles::TitlesRepository,
    pub borrowers: borrowers::BorrowersRepository,
    pub loans: loans::LoansRepository,
    pub requests: requests::RequestsRepository,
    pub feedback: feedback::FeedbackRepository,
}

impl PgStore {
    /// Create a new store with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            titles: titles::TitlesRepository::new(pool.clone()),
            borrowers: borrowers::BorrowersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            requests: requests::RequestsRepository::new(pool.clone()),
            feedback: feedback::FeedbackRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl LibraryStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_title(&self, isbn: &str) -> AppResult<Option<Title>> {
        self.titles.get(isbn).await
    }

    async fn list_titles(&self) -> AppResult<Vec<Title>> {
        self.titles.list().await
    }

    async fn find_title(&self, title: &str, author: &str) -> AppResult<Option<Title>> {
        self.titles.find_by_name(title, author).await
    }

    async fn create_title(&self, title: &Title) -> AppResult<()> {
        self.titles.create(title).await
    }

    async fn merge_copies(
        &self,
        isbn: &str,
        copies: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<(Title, Vec<String>)> {
        self.titles.merge_copies(isbn, copies, now).await
    }

    async fn remove_copies(
        &self,
        isbn: &str,
        selection: &CopySelection,
        now: DateTime<Utc>,
    ) -> AppResult<CopyRemoval> {
        self.titles.remove_copies(isbn, selection, now).await
    }

    async fn get_borrower(&self, id: &str) -> AppResult<Option<Borrower>> {
        self.borrowers.get(id).await
    }

    async fn list_borrowers(&self) -> AppResult<Vec<Borrower>> {
        self.borrowers.list().await
    }

    async fn create_borrower(&self, borrower: &Borrower) -> AppResult<()> {
        self.borrowers.create(borrower).await
    }

    async fn get_loan(&self, copy_number: &str) -> AppResult<Option<Loan>> {
        self.loans.get(copy_number).await
    }

    async fn list_loans(&self) -> AppResult<Vec<Loan>> {
        self.loans.list().await
    }

    async fn commit_issue(&self, loan: &Loan, max_loans: usize) -> AppResult<Title> {
        self.loans.issue(loan, max_loans).await
    }

    async fn commit_return(
        &self,
        borrower_id: &str,
        copy_number: &str,
        returned_at: DateTime<Utc>,
        policy: &LoanPolicy,
    ) -> AppResult<ReturnCommit> {
        self.loans
            .return_copy(borrower_id, copy_number, returned_at, policy)
            .await
    }

    async fn loan_history(&self, borrower_id: &str) -> AppResult<Vec<ArchivedLoan>> {
        self.loans.history(borrower_id).await
    }

    async fn record_request(
        &self,
        title: &str,
        author: &str,
        requester: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BookRequest> {
        self.requests.record(title, author, requester, now).await
    }

    async fn list_requests(&self) -> AppResult<Vec<BookRequest>> {
        self.requests.list().await
    }

    async fn take_request(&self, title: &str, author: &str) -> AppResult<Option<BookRequest>> {
        self.requests.take(title, author).await
    }

    async fn clear_requests(&self) -> AppResult<u64> {
        self.requests.clear().await
    }

    async fn insert_feedback(&self, feedback: &Feedback) -> AppResult<()> {
        self.feedback.insert(feedback).await
    }

    async fn list_feedback(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<Feedback>> {
        self.feedback.list(since).await
    }
}

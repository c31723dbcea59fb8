//! Issue and return of physical copies

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{IssueRequest, LedgerEntry, ReturnReceipt, ReturnRequest},
        Borrower, Loan, LoanPolicy, Title,
    },
    repository::Repository,
};

use super::{
    notifications::{Notification, Notifier},
    requests::RequestsService,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    policy: LoanPolicy,
    requests: RequestsService,
    notifier: Notifier,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        policy: LoanPolicy,
        requests: RequestsService,
        notifier: Notifier,
    ) -> Self {
        Self {
            repository,
            policy,
            requests,
            notifier,
        }
    }

    /// Issue a copy to a borrower
    pub async fn issue(&self, request: &IssueRequest) -> AppResult<Loan> {
        self.issue_at(request, Utc::now()).await
    }

    /// Issue a copy as of `now`.
    ///
    /// Preconditions are checked in order so callers get the most specific
    /// failure. The store repeats the copy, ledger and borrower checks inside
    /// its atomic commit, which is what actually serializes concurrent issues
    /// of the same copy.
    pub async fn issue_at(&self, request: &IssueRequest, now: DateTime<Utc>) -> AppResult<Loan> {
        let borrower_id = request.borrower_id.trim();
        let copy_number = request.copy_number.trim();
        let isbn = request.isbn.trim();

        let borrower = self
            .repository
            .get_borrower(borrower_id)
            .await?
            .ok_or_else(|| AppError::borrower_not_found(borrower_id))?;

        let title = self
            .repository
            .get_title(isbn)
            .await?
            .ok_or_else(|| AppError::title_not_found(isbn))?;

        if !title.available_copies.contains(copy_number) {
            return Err(AppError::CopyUnavailable {
                copy: copy_number.to_string(),
            });
        }

        if self.repository.get_loan(copy_number).await?.is_some() {
            return Err(AppError::AlreadyIssued {
                copy: copy_number.to_string(),
            });
        }

        borrower.check_can_borrow(isbn, self.policy.max_concurrent_loans)?;

        let loan = Loan::new(borrower_id, copy_number, isbn, now, &self.policy);
        let title = self
            .repository
            .commit_issue(&loan, self.policy.max_concurrent_loans)
            .await?;

        tracing::info!(
            "Issued copy {} of {} to borrower {}, due {}",
            loan.copy_number,
            loan.isbn,
            loan.borrower_id,
            loan.due_at
        );

        self.notifier.enqueue(Notification::LoanIssued {
            to: borrower.email,
            name: borrower.name,
            title: title.title,
            copy_number: loan.copy_number.clone(),
            due_at: loan.due_at,
        });

        Ok(loan)
    }

    /// Return a copy, assessing any overdue fine
    pub async fn return_copy(&self, request: &ReturnRequest) -> AppResult<ReturnReceipt> {
        self.return_at(request, Utc::now()).await
    }

    pub async fn return_at(
        &self,
        request: &ReturnRequest,
        now: DateTime<Utc>,
    ) -> AppResult<ReturnReceipt> {
        let borrower_id = request.borrower_id.trim();
        let copy_number = request.copy_number.trim();

        let commit = self
            .repository
            .commit_return(borrower_id, copy_number, now, &self.policy)
            .await?;

        let loan = commit.archived;
        let days_overdue = self.policy.days_overdue(loan.due_at, loan.returned_at);

        tracing::info!(
            "Borrower {} returned copy {} of {} ({} days overdue, fine {})",
            borrower_id,
            copy_number,
            loan.isbn,
            days_overdue,
            loan.fine
        );

        // Side effects below are best-effort; the return is already committed.
        match self.repository.get_borrower(borrower_id).await {
            Ok(Some(borrower)) => self.notifier.enqueue(Notification::LoanReturned {
                to: borrower.email,
                name: borrower.name,
                title: commit
                    .title
                    .as_ref()
                    .map(|t| t.title.clone())
                    .unwrap_or_else(|| loan.isbn.clone()),
                copy_number: loan.copy_number.clone(),
                fine: loan.fine,
            }),
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not load borrower {} for notification: {}", borrower_id, e),
        }

        if let Some(title) = &commit.title {
            self.requests.resolve_quietly(title).await;
        }

        Ok(ReturnReceipt {
            fine_assessed: loan.fine,
            days_overdue,
            loan,
        })
    }

    /// Every active loan with borrower and title details
    pub async fn ledger(&self, now: DateTime<Utc>) -> AppResult<Vec<LedgerEntry>> {
        let loans = self.repository.list_loans().await?;

        let mut borrowers: HashMap<String, Option<Borrower>> = HashMap::new();
        let mut titles: HashMap<String, Option<Title>> = HashMap::new();
        let mut entries = Vec::with_capacity(loans.len());

        for loan in loans {
            if !borrowers.contains_key(&loan.borrower_id) {
                let borrower = self.repository.get_borrower(&loan.borrower_id).await?;
                borrowers.insert(loan.borrower_id.clone(), borrower);
            }
            if !titles.contains_key(&loan.isbn) {
                let title = self.repository.get_title(&loan.isbn).await?;
                titles.insert(loan.isbn.clone(), title);
            }

            let borrower = borrowers.get(&loan.borrower_id).and_then(Option::as_ref);
            let title = titles.get(&loan.isbn).and_then(Option::as_ref);

            entries.push(LedgerEntry {
                borrower_name: borrower
                    .map(|b| b.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                title: title
                    .map(|t| t.title.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                author: title
                    .map(|t| t.author.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                is_overdue: loan.is_overdue(now),
                borrower_id: loan.borrower_id,
                copy_number: loan.copy_number,
                isbn: loan.isbn,
                issued_at: loan.issued_at,
                due_at: loan.due_at,
            });
        }

        Ok(entries)
    }
}

//! Borrower registration, loan view, history and staff broadcasts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrower::{department_code, BorrowerDetails, CreateBorrower, HeldCopy},
        ArchivedLoan, Borrower, LoanPolicy,
    },
    repository::Repository,
};

use super::notifications::{Notification, Notifier};

#[derive(Clone)]
pub struct BorrowersService {
    repository: Repository,
    policy: LoanPolicy,
    notifier: Notifier,
}

impl BorrowersService {
    pub fn new(repository: Repository, policy: LoanPolicy, notifier: Notifier) -> Self {
        Self {
            repository,
            policy,
            notifier,
        }
    }

    pub async fn register(&self, request: CreateBorrower, now: DateTime<Utc>) -> AppResult<Borrower> {
        let borrower = request.into_borrower(now);
        self.repository.create_borrower(&borrower).await?;
        tracing::info!("Registered borrower {}", borrower.id);
        Ok(borrower)
    }

    pub async fn get(&self, id: &str) -> AppResult<Borrower> {
        self.repository
            .get_borrower(id)
            .await?
            .ok_or_else(|| AppError::borrower_not_found(id))
    }

    /// All borrowers, optionally restricted to one department code
    pub async fn list(&self, department: Option<&str>) -> AppResult<Vec<Borrower>> {
        let borrowers = self.repository.list_borrowers().await?;
        Ok(match department.map(department_code) {
            Some(code) => borrowers
                .into_iter()
                .filter(|b| b.department.as_deref() == Some(code.as_str()))
                .collect(),
            None => borrowers,
        })
    }

    /// Borrower with each held copy and the fine it would incur if returned at `now`
    pub async fn details(&self, id: &str, now: DateTime<Utc>) -> AppResult<BorrowerDetails> {
        let borrower = self.get(id).await?;

        let mut held_copies = Vec::with_capacity(borrower.loan_count());
        for (copy_number, copy) in &borrower.borrowed_copies {
            let title = self.repository.get_title(&copy.isbn).await?;
            let (title, author) = title
                .map(|t| (t.title, t.author))
                .unwrap_or_else(|| ("Unknown".to_string(), "Unknown".to_string()));

            held_copies.push(HeldCopy {
                copy_number: copy_number.clone(),
                isbn: copy.isbn.clone(),
                title,
                author,
                issued_at: copy.issued_at,
                due_at: copy.due_at,
                days_overdue: self.policy.days_overdue(copy.due_at, now),
                accrued_fine: self.policy.fine_for(copy.due_at, now),
            });
        }

        let accrued_fine = held_copies
            .iter()
            .map(|c| c.accrued_fine)
            .fold(Decimal::ZERO, |acc, fine| acc + fine);

        Ok(BorrowerDetails {
            borrower,
            held_copies,
            accrued_fine,
        })
    }

    /// Archived loans, newest first
    pub async fn history(&self, id: &str) -> AppResult<Vec<ArchivedLoan>> {
        self.get(id).await?;
        self.repository.loan_history(id).await
    }

    /// Queue a message to every borrower with an email, optionally only
    /// those in the given departments. Returns how many were queued.
    pub async fn broadcast(&self, message: &str, departments: &[String]) -> AppResult<usize> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("Message is required".to_string()));
        }

        let codes: Vec<String> = departments
            .iter()
            .map(|d| department_code(d))
            .filter(|c| !c.is_empty())
            .collect();

        let mut queued = 0;
        for borrower in self.repository.list_borrowers().await? {
            if borrower.email.is_empty() {
                continue;
            }
            if !codes.is_empty() {
                let in_department = borrower
                    .department
                    .as_ref()
                    .is_some_and(|d| codes.contains(d));
                if !in_department {
                    continue;
                }
            }

            self.notifier.enqueue(Notification::Broadcast {
                to: borrower.email,
                name: borrower.name,
                message: message.to_string(),
            });
            queued += 1;
        }

        tracing::info!("Broadcast queued for {} borrowers", queued);
        Ok(queued)
    }
}

//! In-memory store.
//!
//! All state sits behind one `RwLock`; each compound mutation validates and
//! applies its changes inside a single write guard, so readers never observe
//! a half-applied issue or return.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        feedback::Feedback,
        request::normalize_key,
        title::{CopyRemoval, CopySelection},
        ArchivedLoan, BookRequest, Borrower, Loan, LoanPolicy, Title,
    },
};

use super::{LibraryStore, ReturnCommit};

#[derive(Debug, Default)]
struct MemoryState {
    titles: BTreeMap<String, Title>,
    borrowers: BTreeMap<String, Borrower>,
    loans: BTreeMap<String, Loan>,
    history: Vec<ArchivedLoan>,
    requests: BTreeMap<(String, String), BookRequest>,
    feedback: Vec<Feedback>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_title(&self, isbn: &str) -> AppResult<Option<Title>> {
        Ok(self.state.read().await.titles.get(isbn).cloned())
    }

    async fn list_titles(&self) -> AppResult<Vec<Title>> {
        let state = self.state.read().await;
        let mut titles: Vec<Title> = state.titles.values().cloned().collect();
        titles.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.isbn.cmp(&b.isbn)));
        Ok(titles)
    }

    async fn find_title(&self, title: &str, author: &str) -> AppResult<Option<Title>> {
        let (title, author) = (normalize_key(title), normalize_key(author));
        let state = self.state.read().await;
        Ok(state
            .titles
            .values()
            .filter(|t| normalize_key(&t.title) == title && normalize_key(&t.author) == author)
            .max_by_key(|t| t.available_copies.len())
            .cloned())
    }

    async fn create_title(&self, title: &Title) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.titles.contains_key(&title.isbn) {
            return Err(AppError::Conflict(format!(
                "A title with ISBN {} already exists",
                title.isbn
            )));
        }
        state.titles.insert(title.isbn.clone(), title.clone());
        Ok(())
    }

    async fn merge_copies(
        &self,
        isbn: &str,
        copies: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<(Title, Vec<String>)> {
        let mut state = self.state.write().await;
        let title = state
            .titles
            .get_mut(isbn)
            .ok_or_else(|| AppError::title_not_found(isbn))?;

        let added = title.merge_copies(copies);
        if !added.is_empty() {
            title.updated_at = now;
        }
        Ok((title.clone(), added))
    }

    async fn remove_copies(
        &self,
        isbn: &str,
        selection: &CopySelection,
        now: DateTime<Utc>,
    ) -> AppResult<CopyRemoval> {
        let mut state = self.state.write().await;
        let title = state
            .titles
            .get(isbn)
            .cloned()
            .ok_or_else(|| AppError::title_not_found(isbn))?;

        let outcome = title.apply_removal(selection)?;
        match &outcome {
            CopyRemoval::TitleDeleted { isbn, .. } => {
                state.titles.remove(isbn);
            }
            CopyRemoval::CopiesRemoved { title, .. } => {
                let mut title = title.clone();
                title.updated_at = now;
                state.titles.insert(title.isbn.clone(), title);
            }
        }
        Ok(outcome)
    }

    async fn get_borrower(&self, id: &str) -> AppResult<Option<Borrower>> {
        Ok(self.state.read().await.borrowers.get(id).cloned())
    }

    async fn list_borrowers(&self) -> AppResult<Vec<Borrower>> {
        Ok(self.state.read().await.borrowers.values().cloned().collect())
    }

    async fn create_borrower(&self, borrower: &Borrower) -> AppResult<()> {
        let mut state = self.state.write().await;
        let taken = state.borrowers.contains_key(&borrower.id)
            || state
                .borrowers
                .values()
                .any(|b| b.email.eq_ignore_ascii_case(&borrower.email));
        if taken {
            return Err(AppError::Conflict(format!(
                "A borrower with id {} or email {} already exists",
                borrower.id, borrower.email
            )));
        }
        state.borrowers.insert(borrower.id.clone(), borrower.clone());
        Ok(())
    }

    async fn get_loan(&self, copy_number: &str) -> AppResult<Option<Loan>> {
        Ok(self.state.read().await.loans.get(copy_number).cloned())
    }

    async fn list_loans(&self) -> AppResult<Vec<Loan>> {
        let state = self.state.read().await;
        let mut loans: Vec<Loan> = state.loans.values().cloned().collect();
        loans.sort_by(|a, b| {
            a.issued_at
                .cmp(&b.issued_at)
                .then_with(|| a.copy_number.cmp(&b.copy_number))
        });
        Ok(loans)
    }

    async fn commit_issue(&self, loan: &Loan, max_loans: usize) -> AppResult<Title> {
        let mut state = self.state.write().await;

        let mut title = state
            .titles
            .get(&loan.isbn)
            .cloned()
            .ok_or_else(|| AppError::CopyUnavailable {
                copy: loan.copy_number.clone(),
            })?;
        title.check_out(&loan.copy_number)?;
        title.updated_at = loan.issued_at;

        if state.loans.contains_key(&loan.copy_number) {
            return Err(AppError::AlreadyIssued {
                copy: loan.copy_number.clone(),
            });
        }

        let borrower = state
            .borrowers
            .get_mut(&loan.borrower_id)
            .ok_or_else(|| AppError::borrower_not_found(&loan.borrower_id))?;
        borrower.check_can_borrow(&loan.isbn, max_loans)?;

        // every check passed, apply all three writes
        borrower
            .borrowed_copies
            .insert(loan.copy_number.clone(), loan.borrowed_copy());
        state.loans.insert(loan.copy_number.clone(), loan.clone());
        state.titles.insert(title.isbn.clone(), title.clone());

        Ok(title)
    }

    async fn commit_return(
        &self,
        borrower_id: &str,
        copy_number: &str,
        returned_at: DateTime<Utc>,
        policy: &LoanPolicy,
    ) -> AppResult<ReturnCommit> {
        let mut state = self.state.write().await;

        let loan = match state.loans.get(copy_number) {
            Some(loan) if loan.borrower_id == borrower_id => loan.clone(),
            _ => return Err(AppError::loan_not_found(borrower_id, copy_number)),
        };
        state.loans.remove(copy_number);

        let fine = policy.fine_for(loan.due_at, returned_at);
        let archived = ArchivedLoan::from_loan(loan, returned_at, fine);
        state.history.push(archived.clone());

        let title = state.titles.get_mut(&archived.isbn).map(|title| {
            title.check_in(copy_number);
            title.updated_at = returned_at;
            title.clone()
        });

        if let Some(borrower) = state.borrowers.get_mut(borrower_id) {
            borrower.borrowed_copies.remove(copy_number);
            borrower.fine += fine;
        }

        Ok(ReturnCommit { archived, title })
    }

    async fn loan_history(&self, borrower_id: &str) -> AppResult<Vec<ArchivedLoan>> {
        let state = self.state.read().await;
        let mut history: Vec<ArchivedLoan> = state
            .history
            .iter()
            .filter(|l| l.borrower_id == borrower_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.returned_at.cmp(&a.returned_at));
        Ok(history)
    }

    async fn record_request(
        &self,
        title: &str,
        author: &str,
        requester: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BookRequest> {
        let mut state = self.state.write().await;
        let request = state
            .requests
            .entry((title.to_string(), author.to_string()))
            .and_modify(|r| {
                r.add_requester(requester, now);
            })
            .or_insert_with(|| BookRequest::new(title, author, requester, now));
        Ok(request.clone())
    }

    async fn list_requests(&self) -> AppResult<Vec<BookRequest>> {
        let state = self.state.read().await;
        let mut requests: Vec<BookRequest> = state.requests.values().cloned().collect();
        requests.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        Ok(requests)
    }

    async fn take_request(&self, title: &str, author: &str) -> AppResult<Option<BookRequest>> {
        let mut state = self.state.write().await;
        Ok(state
            .requests
            .remove(&(title.to_string(), author.to_string())))
    }

    async fn clear_requests(&self) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let cleared = state.requests.len() as u64;
        state.requests.clear();
        Ok(cleared)
    }

    async fn insert_feedback(&self, feedback: &Feedback) -> AppResult<()> {
        self.state.write().await.feedback.push(feedback.clone());
        Ok(())
    }

    async fn list_feedback(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<Feedback>> {
        let state = self.state.read().await;
        let mut feedback: Vec<Feedback> = state
            .feedback
            .iter()
            .filter(|f| since.map_or(true, |since| f.created_at >= since))
            .cloned()
            .collect();
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(feedback)
    }
}

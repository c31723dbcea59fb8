//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        borrower::BorrowerRow, title::TitleRow, ArchivedLoan, Borrower, Loan, LoanPolicy, Title,
    },
};

use super::ReturnCommit;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get the active loan of a copy
    pub async fn get(&self, copy_number: &str) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE copy_number = $1")
            .bind(copy_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    pub async fn list(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans ORDER BY issued_at, copy_number")
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// Issue a copy in one transaction.
    ///
    /// The copy leaves `available_copies` only if it is still there, the
    /// loan insert relies on the `copy_number` primary key, and the borrower
    /// row is locked before the loan cap and duplicate-title checks.
    pub async fn issue(&self, loan: &Loan, max_loans: usize) -> AppResult<Title> {
        let mut tx = self.pool.begin().await?;

        let title = sqlx::query_as::<_, TitleRow>(
            r#"
            UPDATE titles
            SET available_copies = array_remove(available_copies, $2),
                issued_copies = array_append(issued_copies, $2),
                updated_at = $3
            WHERE isbn = $1 AND $2 = ANY(available_copies)
            RETURNING *
            "#,
        )
        .bind(&loan.isbn)
        .bind(&loan.copy_number)
        .bind(loan.issued_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::CopyUnavailable {
            copy: loan.copy_number.clone(),
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO loans (copy_number, borrower_id, isbn, issued_at, due_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (copy_number) DO NOTHING
            "#,
        )
        .bind(&loan.copy_number)
        .bind(&loan.borrower_id)
        .bind(&loan.isbn)
        .bind(loan.issued_at)
        .bind(loan.due_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::AlreadyIssued {
                copy: loan.copy_number.clone(),
            });
        }

        let borrower: Borrower =
            sqlx::query_as::<_, BorrowerRow>("SELECT * FROM borrowers WHERE id = $1 FOR UPDATE")
                .bind(&loan.borrower_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::borrower_not_found(&loan.borrower_id))?
                .into();

        borrower.check_can_borrow(&loan.isbn, max_loans)?;

        sqlx::query(
            r#"
            UPDATE borrowers
            SET borrowed_copies = borrowed_copies || jsonb_build_object($2::text, $3::jsonb)
            WHERE id = $1
            "#,
        )
        .bind(&loan.borrower_id)
        .bind(&loan.copy_number)
        .bind(Json(loan.borrowed_copy()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(title.into())
    }

    /// Return a copy in one transaction (moves the loan to loan_history)
    pub async fn return_copy(
        &self,
        borrower_id: &str,
        copy_number: &str,
        returned_at: DateTime<Utc>,
        policy: &LoanPolicy,
    ) -> AppResult<ReturnCommit> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(
            "DELETE FROM loans WHERE copy_number = $1 AND borrower_id = $2 RETURNING *",
        )
        .bind(copy_number)
        .bind(borrower_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::loan_not_found(borrower_id, copy_number))?;

        let fine = policy.fine_for(loan.due_at, returned_at);
        let archived = ArchivedLoan::from_loan(loan, returned_at, fine);

        sqlx::query(
            r#"
            INSERT INTO loan_history (
                id, copy_number, borrower_id, isbn, issued_at, due_at, returned_at, fine
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(archived.id)
        .bind(&archived.copy_number)
        .bind(&archived.borrower_id)
        .bind(&archived.isbn)
        .bind(archived.issued_at)
        .bind(archived.due_at)
        .bind(archived.returned_at)
        .bind(archived.fine)
        .execute(&mut *tx)
        .await?;

        let title = sqlx::query_as::<_, TitleRow>(
            r#"
            UPDATE titles
            SET issued_copies = array_remove(issued_copies, $2),
                available_copies = CASE
                    WHEN $2 = ANY(all_copies) AND NOT ($2 = ANY(available_copies))
                        THEN array_append(available_copies, $2)
                    ELSE available_copies
                END,
                updated_at = $3
            WHERE isbn = $1
            RETURNING *
            "#,
        )
        .bind(&archived.isbn)
        .bind(copy_number)
        .bind(returned_at)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE borrowers
            SET borrowed_copies = borrowed_copies - $2::text,
                fine = fine + $3
            WHERE id = $1
            "#,
        )
        .bind(borrower_id)
        .bind(copy_number)
        .bind(fine)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReturnCommit {
            archived,
            title: title.map(Title::from),
        })
    }

    /// Archived loans for a borrower
    pub async fn history(&self, borrower_id: &str) -> AppResult<Vec<ArchivedLoan>> {
        let loans = sqlx::query_as::<_, ArchivedLoan>(
            "SELECT * FROM loan_history WHERE borrower_id = $1 ORDER BY returned_at DESC",
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }
}

//! Loan (one per issued copy), loan history and loan policy

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::borrower::BorrowedCopy;

/// Circulation policy: loan period, loan cap and overdue fine rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    pub loan_period_days: i64,
    pub max_concurrent_loans: usize,
    pub fine_per_day: Decimal,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 15,
            max_concurrent_loans: 3,
            fine_per_day: Decimal::ONE,
        }
    }
}

impl LoanPolicy {
    pub fn due_date(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::days(self.loan_period_days)
    }

    /// Whole days past the due date, zero if not overdue
    pub fn days_overdue(&self, due_at: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
        if at > due_at {
            (at - due_at).num_days()
        } else {
            0
        }
    }

    pub fn fine_for(&self, due_at: DateTime<Utc>, at: DateTime<Utc>) -> Decimal {
        Decimal::from(self.days_overdue(due_at, at)) * self.fine_per_day
    }
}

/// Active loan of one physical copy. The copy number is the ledger key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub copy_number: String,
    pub borrower_id: String,
    pub isbn: String,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl Loan {
    pub fn new(
        borrower_id: &str,
        copy_number: &str,
        isbn: &str,
        issued_at: DateTime<Utc>,
        policy: &LoanPolicy,
    ) -> Self {
        Self {
            copy_number: copy_number.to_string(),
            borrower_id: borrower_id.to_string(),
            isbn: isbn.to_string(),
            issued_at,
            due_at: policy.due_date(issued_at),
        }
    }

    /// Projection kept in the borrower record
    pub fn borrowed_copy(&self) -> BorrowedCopy {
        BorrowedCopy {
            isbn: self.isbn.clone(),
            issued_at: self.issued_at,
            due_at: self.due_at,
        }
    }

    pub fn is_overdue(&self, at: DateTime<Utc>) -> bool {
        at > self.due_at
    }
}

/// Terminated loan kept for audit and borrowing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ArchivedLoan {
    pub id: Uuid,
    pub copy_number: String,
    pub borrower_id: String,
    pub isbn: String,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: DateTime<Utc>,
    pub fine: Decimal,
}

impl ArchivedLoan {
    pub fn from_loan(loan: Loan, returned_at: DateTime<Utc>, fine: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            copy_number: loan.copy_number,
            borrower_id: loan.borrower_id,
            isbn: loan.isbn,
            issued_at: loan.issued_at,
            due_at: loan.due_at,
            returned_at,
            fine,
        }
    }
}

/// Issue request. Missing fields deserialize empty and fail validation.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct IssueRequest {
    #[validate(length(min = 1, message = "Borrower id is required"))]
    pub borrower_id: String,
    #[validate(length(min = 1, message = "Copy number is required"))]
    pub copy_number: String,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
}

/// Return request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct ReturnRequest {
    #[validate(length(min = 1, message = "Borrower id is required"))]
    pub borrower_id: String,
    #[validate(length(min = 1, message = "Copy number is required"))]
    pub copy_number: String,
}

/// Result of a completed return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnReceipt {
    pub loan: ArchivedLoan,
    pub fine_assessed: Decimal,
    pub days_overdue: i64,
}

/// Active loan enriched for the staff ledger listing
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerEntry {
    pub borrower_id: String,
    pub borrower_name: String,
    pub copy_number: String,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub is_overdue: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn due_date_is_issue_plus_loan_period() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.due_date(day(0)), day(15));
    }

    #[test]
    fn fine_counts_whole_days_past_due() {
        let policy = LoanPolicy::default();
        let due = policy.due_date(day(0));

        assert_eq!(policy.fine_for(due, day(20)), Decimal::from(5));
        assert_eq!(policy.fine_for(due, day(10)), Decimal::ZERO);
        assert_eq!(policy.fine_for(due, due), Decimal::ZERO);
        // a partial day does not count
        assert_eq!(policy.fine_for(due, day(15) + Duration::hours(23)), Decimal::ZERO);
    }

    #[test]
    fn fine_scales_with_configured_rate() {
        let policy = LoanPolicy {
            fine_per_day: Decimal::new(250, 2),
            ..LoanPolicy::default()
        };
        let due = policy.due_date(day(0));
        assert_eq!(policy.fine_for(due, day(19)), Decimal::new(1000, 2));
    }

    #[test]
    fn archived_loan_keeps_loan_fields() {
        let policy = LoanPolicy::default();
        let loan = Loan::new("S1", "BN1-01", "978-0", day(0), &policy);
        let archived = ArchivedLoan::from_loan(loan.clone(), day(3), Decimal::ZERO);

        assert_eq!(archived.copy_number, loan.copy_number);
        assert_eq!(archived.borrower_id, "S1");
        assert_eq!(archived.due_at, day(15));
        assert_eq!(archived.returned_at, day(3));
    }
}

//! Borrower (library user) model and related types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Loan metadata kept on the borrower for each held copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowedCopy {
    pub isbn: String,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Copies currently held, keyed by copy number
pub type BorrowedCopies = BTreeMap<String, BorrowedCopy>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Borrower {
    /// University registration number (SRN)
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub phone: Option<String>,
    /// Cumulative fine assessed on returns
    pub fine: Decimal,
    pub borrowed_copies: BTreeMap<String, BorrowedCopy>,
    pub created_at: DateTime<Utc>,
}

impl Borrower {
    pub fn loan_count(&self) -> usize {
        self.borrowed_copies.len()
    }

    pub fn holds_isbn(&self, isbn: &str) -> bool {
        self.borrowed_copies.values().any(|c| c.isbn == isbn)
    }

    /// Loan cap first, then the one-copy-per-title rule
    pub fn check_can_borrow(&self, isbn: &str, max_loans: usize) -> AppResult<()> {
        if self.loan_count() >= max_loans {
            return Err(AppError::LoanLimitExceeded {
                held: self.loan_count(),
                max: max_loans,
            });
        }
        if self.holds_isbn(isbn) {
            return Err(AppError::DuplicateTitle {
                isbn: isbn.to_string(),
            });
        }
        Ok(())
    }
}

/// Borrower row from database
#[derive(Debug, FromRow)]
pub struct BorrowerRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub phone: Option<String>,
    pub fine: Decimal,
    pub borrowed_copies: Json<BorrowedCopies>,
    pub created_at: DateTime<Utc>,
}

impl From<BorrowerRow> for Borrower {
    fn from(row: BorrowerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            department: row.department,
            semester: row.semester,
            phone: row.phone,
            fine: row.fine,
            borrowed_copies: row.borrowed_copies.0,
            created_at: row.created_at,
        }
    }
}

/// Register borrower request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBorrower {
    #[validate(length(min = 1, message = "Borrower id is required"))]
    pub id: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub phone: Option<String>,
}

impl CreateBorrower {
    pub fn into_borrower(self, now: DateTime<Utc>) -> Borrower {
        Borrower {
            id: self.id.trim().to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            department: self
                .department
                .as_deref()
                .map(department_code)
                .filter(|code| !code.is_empty()),
            semester: self.semester,
            phone: self.phone,
            fine: Decimal::ZERO,
            borrowed_copies: BorrowedCopies::new(),
            created_at: now,
        }
    }
}

/// Department code from a label such as `"Computer Science (CSE)"`, lowercased.
/// A label without parentheses is used as the code itself.
pub fn department_code(label: &str) -> String {
    let label = label.trim();
    let code = match (label.rfind('('), label.rfind(')')) {
        (Some(open), Some(close)) if open < close => &label[open + 1..close],
        _ => label,
    };
    code.trim().to_lowercase()
}

/// One held copy with the fine it would incur if returned now
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HeldCopy {
    pub copy_number: String,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub days_overdue: i64,
    pub accrued_fine: Decimal,
}

/// Borrower with current holdings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowerDetails {
    pub borrower: Borrower,
    pub held_copies: Vec<HeldCopy>,
    /// Sum of fines accruing on held copies
    pub accrued_fine: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_normalizes_department() {
        let borrower = CreateBorrower {
            id: " S1 ".into(),
            name: "Asha".into(),
            email: "asha@example.edu".into(),
            department: Some(" CSE ".into()),
            semester: None,
            phone: None,
        }
        .into_borrower(Utc::now());

        assert_eq!(borrower.id, "S1");
        assert_eq!(borrower.department.as_deref(), Some("cse"));
        assert_eq!(borrower.fine, Decimal::ZERO);
        assert_eq!(borrower.loan_count(), 0);
    }

    #[test]
    fn department_code_comes_from_parentheses() {
        assert_eq!(department_code("Computer Science (CSE)"), "cse");
        assert_eq!(department_code(" ECE "), "ece");
        assert_eq!(department_code("Mechanical (ME"), "mechanical (me");
        assert_eq!(department_code("Civil ( CV )"), "cv");
    }

    #[test]
    fn registration_stores_the_department_code_of_a_label() {
        let borrower = CreateBorrower {
            id: "S2".into(),
            name: "Ravi".into(),
            email: "ravi@example.edu".into(),
            department: Some("Computer Science (CSE)".into()),
            semester: None,
            phone: None,
        }
        .into_borrower(Utc::now());
        assert_eq!(borrower.department.as_deref(), Some("cse"));

        let blank = CreateBorrower {
            department: Some("  ".into()),
            ..CreateBorrower {
                id: "S3".into(),
                name: "Meera".into(),
                email: "meera@example.edu".into(),
                department: None,
                semester: None,
                phone: None,
            }
        }
        .into_borrower(Utc::now());
        assert_eq!(blank.department, None);
    }

    #[test]
    fn loan_cap_is_checked_before_duplicate_title() {
        let now = Utc::now();
        let mut borrower = CreateBorrower {
            id: "S1".into(),
            name: "Asha".into(),
            email: "asha@example.edu".into(),
            department: None,
            semester: None,
            phone: None,
        }
        .into_borrower(now);

        let held = BorrowedCopy {
            isbn: "978-0".into(),
            issued_at: now,
            due_at: now,
        };
        borrower.borrowed_copies.insert("BN1-01".into(), held.clone());
        assert!(matches!(
            borrower.check_can_borrow("978-0", 3),
            Err(AppError::DuplicateTitle { .. })
        ));
        assert!(borrower.check_can_borrow("978-1", 3).is_ok());

        for (copy, isbn) in [("BN2-01", "978-2"), ("BN3-01", "978-3")] {
            borrower.borrowed_copies.insert(
                copy.into(),
                BorrowedCopy {
                    isbn: isbn.into(),
                    ..held.clone()
                },
            );
        }
        assert!(matches!(
            borrower.check_can_borrow("978-0", 3),
            Err(AppError::LoanLimitExceeded { held: 3, max: 3 })
        ));
    }

    #[test]
    fn invalid_email_fails_validation() {
        let request = CreateBorrower {
            id: "S1".into(),
            name: "Asha".into(),
            email: "not-an-email".into(),
            department: None,
            semester: None,
            phone: None,
        };
        assert!(request.validate().is_err());
    }
}

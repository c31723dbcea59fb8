//! Data models for the circulation server

pub mod borrower;
pub mod feedback;
pub mod identity;
pub mod loan;
pub mod request;
pub mod title;

// Re-export commonly used types
pub use borrower::{BorrowedCopy, Borrower};
pub use identity::{Role, UserClaims};
pub use loan::{ArchivedLoan, Loan, LoanPolicy};
pub use request::BookRequest;
pub use title::{Title, TitleStatus};

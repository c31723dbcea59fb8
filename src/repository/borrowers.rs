//! Borrowers repository for database operations

use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{borrower::BorrowerRow, Borrower},
};

#[derive(Clone)]
pub struct BorrowersRepository {
    pool: Pool<Postgres>,
}

impl BorrowersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<Borrower>> {
        let row = sqlx::query_as::<_, BorrowerRow>("SELECT * FROM borrowers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Borrower::from))
    }

    pub async fn list(&self) -> AppResult<Vec<Borrower>> {
        let rows = sqlx::query_as::<_, BorrowerRow>("SELECT * FROM borrowers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Borrower::from).collect())
    }

    /// Register a borrower; id and email are both unique
    pub async fn create(&self, borrower: &Borrower) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO borrowers (
                id, name, email, department, semester, phone, fine, borrowed_copies, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&borrower.id)
        .bind(&borrower.name)
        .bind(&borrower.email)
        .bind(&borrower.department)
        .bind(&borrower.semester)
        .bind(&borrower.phone)
        .bind(borrower.fine)
        .bind(Json(&borrower.borrowed_copies))
        .bind(borrower.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "A borrower with id {} or email {} already exists",
                borrower.id, borrower.email
            )));
        }
        Ok(())
    }
}

//! Titles repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::title::{CopyRemoval, CopySelection, Title, TitleRow},
};

#[derive(Clone)]
pub struct TitlesRepository {
    pool: Pool<Postgres>,
}

impl TitlesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get title by ISBN
    pub async fn get(&self, isbn: &str) -> AppResult<Option<Title>> {
        let row = sqlx::query_as::<_, TitleRow>("SELECT * FROM titles WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Title::from))
    }

    pub async fn list(&self) -> AppResult<Vec<Title>> {
        let rows = sqlx::query_as::<_, TitleRow>("SELECT * FROM titles ORDER BY title, isbn")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Title::from).collect())
    }

    pub async fn find_by_name(&self, title: &str, author: &str) -> AppResult<Option<Title>> {
        let row = sqlx::query_as::<_, TitleRow>(
            r#"
            SELECT * FROM titles
            WHERE lower(title) = lower($1) AND lower(author) = lower($2)
            ORDER BY cardinality(available_copies) DESC
            LIMIT 1
            "#,
        )
        .bind(title.trim())
        .bind(author.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Title::from))
    }

    /// Create a new title
    pub async fn create(&self, title: &Title) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO titles (
                isbn, title, author, edition, publisher, year, tags, branches,
                shelf, shelf_row, image_url, all_copies, available_copies, issued_copies,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (isbn) DO NOTHING
            "#,
        )
        .bind(&title.isbn)
        .bind(&title.title)
        .bind(&title.author)
        .bind(title.edition)
        .bind(&title.publisher)
        .bind(title.year)
        .bind(title.tags.iter().cloned().collect::<Vec<_>>())
        .bind(title.branches.iter().cloned().collect::<Vec<_>>())
        .bind(&title.location.shelf)
        .bind(&title.location.row)
        .bind(&title.image_url)
        .bind(title.all_copies.iter().cloned().collect::<Vec<_>>())
        .bind(title.available_copies.iter().cloned().collect::<Vec<_>>())
        .bind(title.issued_copies.iter().cloned().collect::<Vec<_>>())
        .bind(title.created_at)
        .bind(title.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "A title with ISBN {} already exists",
                title.isbn
            )));
        }
        Ok(())
    }

    /// Add copy numbers under a row lock
    pub async fn merge_copies(
        &self,
        isbn: &str,
        copies: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<(Title, Vec<String>)> {
        let mut tx = self.pool.begin().await?;

        let mut title: Title =
            sqlx::query_as::<_, TitleRow>("SELECT * FROM titles WHERE isbn = $1 FOR UPDATE")
                .bind(isbn)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::title_not_found(isbn))?
                .into();

        let added = title.merge_copies(copies);
        if added.is_empty() {
            tx.rollback().await?;
            return Ok((title, added));
        }

        let row = sqlx::query_as::<_, TitleRow>(
            r#"
            UPDATE titles
            SET all_copies = $2, available_copies = $3, updated_at = $4
            WHERE isbn = $1
            RETURNING *
            "#,
        )
        .bind(isbn)
        .bind(title.all_copies.iter().cloned().collect::<Vec<_>>())
        .bind(title.available_copies.iter().cloned().collect::<Vec<_>>())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((row.into(), added))
    }

    /// Remove copies under a row lock; issued copies block the whole request
    pub async fn remove_copies(
        &self,
        isbn: &str,
        selection: &CopySelection,
        now: DateTime<Utc>,
    ) -> AppResult<CopyRemoval> {
        let mut tx = self.pool.begin().await?;

        let title: Title =
            sqlx::query_as::<_, TitleRow>("SELECT * FROM titles WHERE isbn = $1 FOR UPDATE")
                .bind(isbn)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::title_not_found(isbn))?
                .into();

        let outcome = match title.apply_removal(selection)? {
            CopyRemoval::TitleDeleted { isbn, removed } => {
                sqlx::query("DELETE FROM titles WHERE isbn = $1")
                    .bind(&isbn)
                    .execute(&mut *tx)
                    .await?;
                CopyRemoval::TitleDeleted { isbn, removed }
            }
            CopyRemoval::CopiesRemoved { title, removed } => {
                let row = sqlx::query_as::<_, TitleRow>(
                    r#"
                    UPDATE titles
                    SET all_copies = $2, available_copies = $3, updated_at = $4
                    WHERE isbn = $1
                    RETURNING *
                    "#,
                )
                .bind(&title.isbn)
                .bind(title.all_copies.iter().cloned().collect::<Vec<_>>())
                .bind(title.available_copies.iter().cloned().collect::<Vec<_>>())
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                CopyRemoval::CopiesRemoved {
                    title: row.into(),
                    removed,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

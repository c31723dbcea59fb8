//! Book request tally repository

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{error::AppResult, models::BookRequest};

#[derive(Clone)]
pub struct RequestsRepository {
    pool: Pool<Postgres>,
}

impl RequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a tally row or add the requester to the existing one
    pub async fn record(
        &self,
        title: &str,
        author: &str,
        requester: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BookRequest> {
        let request = sqlx::query_as::<_, BookRequest>(
            r#"
            INSERT INTO book_requests (id, title, author, requested_by, count, created_at, updated_at)
            VALUES ($1, $2, $3, ARRAY[$4::text], 1, $5, $5)
            ON CONFLICT (title, author) DO UPDATE SET
                requested_by = CASE
                    WHEN $4 = ANY(book_requests.requested_by) THEN book_requests.requested_by
                    ELSE array_append(book_requests.requested_by, $4)
                END,
                count = CASE
                    WHEN $4 = ANY(book_requests.requested_by) THEN book_requests.count
                    ELSE book_requests.count + 1
                END,
                updated_at = CASE
                    WHEN $4 = ANY(book_requests.requested_by) THEN book_requests.updated_at
                    ELSE $5
                END
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(author)
        .bind(requester)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(request)
    }

    pub async fn list(&self) -> AppResult<Vec<BookRequest>> {
        let requests = sqlx::query_as::<_, BookRequest>(
            "SELECT * FROM book_requests ORDER BY count DESC, updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    pub async fn take(&self, title: &str, author: &str) -> AppResult<Option<BookRequest>> {
        let request = sqlx::query_as::<_, BookRequest>(
            "DELETE FROM book_requests WHERE title = $1 AND author = $2 RETURNING *",
        )
        .bind(title)
        .bind(author)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    pub async fn clear(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM book_requests")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

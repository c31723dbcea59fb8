//! Feedback repository

use chrono::{DateTime, Utc};
use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::AppResult,
    models::feedback::{Feedback, FeedbackRow},
};

#[derive(Clone)]
pub struct FeedbackRepository {
    pool: Pool<Postgres>,
}

impl FeedbackRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, feedback: &Feedback) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO feedback (id, message, author, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(feedback.id)
        .bind(&feedback.message)
        .bind(feedback.author.as_ref().map(Json))
        .bind(feedback.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT * FROM feedback
            WHERE $1::timestamptz IS NULL OR created_at >= $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Feedback::from).collect())
    }
}

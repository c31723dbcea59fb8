//! Reader feedback

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::feedback::{CreateFeedback, Feedback, FeedbackRange},
    repository::Repository,
};

#[derive(Clone)]
pub struct FeedbackService {
    repository: Repository,
}

impl FeedbackService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn submit(&self, request: CreateFeedback, now: DateTime<Utc>) -> AppResult<Feedback> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("Message is required".to_string()));
        }

        let feedback = Feedback {
            id: Uuid::new_v4(),
            message: message.to_string(),
            author: request.author,
            created_at: now,
        };
        self.repository.insert_feedback(&feedback).await?;
        Ok(feedback)
    }

    pub async fn list(&self, range: FeedbackRange, now: DateTime<Utc>) -> AppResult<Vec<Feedback>> {
        self.repository.list_feedback(range.since(now)).await
    }
}

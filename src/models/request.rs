//! Book request tally: titles readers asked for that cannot be lent yet

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One row per (title, author), counting distinct requesters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookRequest {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub requested_by: Vec<String>,
    pub count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookRequest {
    pub fn new(title: &str, author: &str, requester: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: normalize_key(title),
            author: normalize_key(author),
            requested_by: vec![requester.to_string()],
            count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a requester; repeat requests from the same reader do not count twice
    pub fn add_requester(&mut self, requester: &str, now: DateTime<Utc>) -> bool {
        if self.requested_by.iter().any(|r| r == requester) {
            return false;
        }
        self.requested_by.push(requester.to_string());
        self.count += 1;
        self.updated_at = now;
        true
    }
}

/// Lookup key for titles and authors: trimmed and lowercased
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Submit book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBookRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    /// Requesting borrower; defaults to the caller
    pub borrower_id: Option<String>,
}

/// Tally row enriched with catalog data when the title is known
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookRequestView {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub count: i32,
    pub image_url: String,
    pub branches: BTreeSet<String>,
}

//! Reader feedback

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Who left the feedback, as they chose to identify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackAuthor {
    pub name: Option<String>,
    pub borrower_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Feedback {
    pub id: Uuid,
    pub message: String,
    pub author: Option<FeedbackAuthor>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub message: String,
    pub author: Option<Json<FeedbackAuthor>>,
    pub created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            message: row.message,
            author: row.author.map(|a| a.0),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateFeedback {
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    pub author: Option<FeedbackAuthor>,
}

/// Listing window for feedback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackRange {
    Week,
    Month,
    #[serde(rename = "3months")]
    ThreeMonths,
    Year,
    #[default]
    All,
}

impl FeedbackRange {
    /// Earliest creation time included, `None` for everything
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            FeedbackRange::Week => Some(now - Duration::days(7)),
            FeedbackRange::Month => now.checked_sub_months(Months::new(1)),
            FeedbackRange::ThreeMonths => now.checked_sub_months(Months::new(3)),
            FeedbackRange::Year => now.checked_sub_months(Months::new(12)),
            FeedbackRange::All => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct FeedbackQuery {
    #[serde(default)]
    pub range: FeedbackRange,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ranges_step_back_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap();

        assert_eq!(FeedbackRange::All.since(now), None);
        assert_eq!(
            FeedbackRange::Week.since(now),
            Some(Utc.with_ymd_and_hms(2024, 5, 24, 12, 0, 0).unwrap())
        );
        assert_eq!(
            FeedbackRange::ThreeMonths.since(now),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn range_parses_from_query_value() {
        let range: FeedbackRange = serde_json::from_str("\"3months\"").unwrap();
        assert_eq!(range, FeedbackRange::ThreeMonths);
    }
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_handle: String,
}

/// Raw activity counts a user accumulated inside the engagement window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngagementCounts {
    pub likes: i64,
    pub comments: i64,
    pub perpetuates: i64,
}

/// Result of a successful perpetuate submission.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PerpetuateOutcome {
    pub trust_score: f64,
    pub trust_value: f64,
    pub max_allowed: f64,
}

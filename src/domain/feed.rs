use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Per-post aggregates the ranking law is evaluated over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PostAggregate {
    pub likes: i64,
    pub comments: i64,
    pub trust_sum: f64,
    pub interest_sum: f64,
    pub similar_creator: bool,
    pub age_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_handle: String,
    pub content: String,
    pub media_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub likes_count: i64,
    pub comments_count: i64,
    pub trust_sum: f64,
    pub interest_sum: f64,
    pub similar_creator: bool,
    pub age_hours: f64,
    pub score: f64,
    pub user_liked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub posts: Vec<FeedItem>,
    pub limit: i64,
    pub offset: i64,
}

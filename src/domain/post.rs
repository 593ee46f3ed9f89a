use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::tag::Tag;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub media_url: Option<String>,
    /// Running sum of the trust-adjusted endorsement values on this post.
    pub perpetuate_boost: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedPost {
    pub post: Post,
    pub tag_ids: Vec<Uuid>,
}

/// A single post with its engagement aggregates and tags.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author_handle: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub trust_sum: f64,
    pub tags: Vec<Tag>,
}

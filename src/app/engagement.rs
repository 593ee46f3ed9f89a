use sqlx::Row;
use uuid::Uuid;

use crate::app::error::{CoreError, CoreResult};
use crate::app::scoring;
use crate::config::tunables::EngagementRules;
use crate::domain::engagement::{Comment, CommentWithAuthor, EngagementCounts};
use crate::infra::db::Db;

pub const MAX_COMMENT_LEN: usize = 2000;
pub const DEFAULT_COMMENT_PAGE: i64 = 50;
const MAX_COMMENT_PAGE: i64 = 100;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
    rules: EngagementRules,
}

impl EngagementService {
    pub fn new(db: Db, rules: EngagementRules) -> Self {
        Self { db, rules }
    }

    /// Likes given, comments written and perpetuates submitted by the user
    /// inside the trailing engagement window.
    pub async fn engagement_counts(&self, user_id: Uuid) -> CoreResult<EngagementCounts> {
        let row = sqlx::query(
            "WITH win AS (SELECT now() - make_interval(days => $2::int) AS since) \
             SELECT \
                (SELECT COUNT(*) FROM likes, win WHERE user_id = $1 AND created_at >= win.since) AS likes, \
                (SELECT COUNT(*) FROM comments, win WHERE user_id = $1 AND created_at >= win.since) AS comments, \
                (SELECT COUNT(*) FROM perpetuates, win WHERE user_id = $1 AND created_at >= win.since) AS perpetuates",
        )
        .bind(user_id)
        .bind(self.rules.window_days)
        .fetch_one(self.db.pool())
        .await?;

        Ok(EngagementCounts {
            likes: row.get("likes"),
            comments: row.get("comments"),
            perpetuates: row.get("perpetuates"),
        })
    }

    /// Recomputed from the base tables on every call.
    pub async fn compute_engagement_score(&self, user_id: Uuid) -> CoreResult<f64> {
        let counts = self.engagement_counts(user_id).await?;
        Ok(scoring::engagement_score(counts))
    }

    pub async fn lifetime_comment_count(&self, user_id: Uuid) -> CoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Returns whether a new like was recorded; an existing like is left alone.
    pub async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (post_id, user_id) DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a like was removed; removing a missing like is a no-op.
    pub async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> CoreResult<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::invalid("comment content is required"));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(CoreError::invalid(format!(
                "comment must be at most {} characters",
                MAX_COMMENT_LEN
            )));
        }

        let row = sqlx::query(
            "INSERT INTO comments (post_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING id, post_id, user_id, content, created_at",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Comment {
            id: row.get("id"),
            user_id: row.get("user_id"),
            post_id: row.get("post_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
    }

    /// Oldest first. `limit` is clamped to [1, 100] and `offset` to >= 0.
    pub async fn list_comments(
        &self,
        post_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<CommentWithAuthor>> {
        let (limit, offset) = clamp_comment_page(limit, offset);
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, u.handle AS author_handle \
             FROM comments c \
             JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC \
             LIMIT $2 OFFSET $3",
        )
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            comments.push(CommentWithAuthor {
                comment: Comment {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    post_id: row.get("post_id"),
                    content: row.get("content"),
                    created_at: row.get("created_at"),
                },
                author_handle: row.get("author_handle"),
            });
        }

        Ok(comments)
    }
}

pub fn clamp_comment_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_COMMENT_PAGE), offset.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_page_is_clamped() {
        assert_eq!(clamp_comment_page(0, -5), (1, 0));
        assert_eq!(clamp_comment_page(500, 20), (100, 20));
        assert_eq!(clamp_comment_page(DEFAULT_COMMENT_PAGE, 0), (50, 0));
    }
}

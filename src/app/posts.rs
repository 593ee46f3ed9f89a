use sqlx::Row;
use uuid::Uuid;

use crate::app::error::{CoreError, CoreResult};
use crate::app::tags::{normalize_tags, TagService};
use crate::config::tunables::TagRules;
use crate::domain::post::{CreatedPost, Post, PostDetail};
use crate::infra::db::Db;

pub const MAX_CONTENT_LEN: usize = 5000;

/// Validated input for a new post; tags are already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub content: String,
    pub media_url: Option<String>,
    pub tags: Vec<String>,
}

impl PostDraft {
    pub fn new<S: AsRef<str>>(
        content: &str,
        media_url: Option<String>,
        raw_tags: &[S],
        rules: TagRules,
    ) -> CoreResult<Self> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::invalid("content is required"));
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(CoreError::invalid(format!(
                "content must be at most {} characters",
                MAX_CONTENT_LEN
            )));
        }

        let tags = normalize_tags(raw_tags, rules);
        if tags.is_empty() {
            return Err(CoreError::invalid("at least one valid tag is required"));
        }

        let media_url = media_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            content: content.to_string(),
            media_url,
            tags,
        })
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn exists(&self, post_id: Uuid) -> CoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    pub async fn ensure_exists(&self, post_id: Uuid) -> CoreResult<()> {
        if self.exists(post_id).await? {
            Ok(())
        } else {
            Err(CoreError::not_found("post not found"))
        }
    }

    /// Insert the post, get-or-create its tags and link them, all in one
    /// transaction. Any failure leaves no post behind.
    pub async fn create_post(&self, user_id: Uuid, draft: PostDraft) -> CoreResult<CreatedPost> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query(
            "INSERT INTO posts (user_id, content, media_url) \
             VALUES ($1, $2, $3) \
             RETURNING id, user_id, content, media_url, perpetuate_boost, created_at, updated_at",
        )
        .bind(user_id)
        .bind(&draft.content)
        .bind(&draft.media_url)
        .fetch_one(&mut *tx)
        .await?;
        let post = post_from_row(&row);

        let tag_ids = TagService::upsert_tags_with_tx(&draft.tags, &mut tx).await?;
        if tag_ids.len() != draft.tags.len() {
            tx.rollback().await?;
            return Err(CoreError::Internal(anyhow::anyhow!(
                "resolved {} of {} tags",
                tag_ids.len(),
                draft.tags.len()
            )));
        }
        TagService::attach_tags_with_tx(post.id, &tag_ids, &mut tx).await?;

        tx.commit().await?;

        Ok(CreatedPost { post, tag_ids })
    }

    pub async fn get_post(&self, post_id: Uuid) -> CoreResult<Option<PostDetail>> {
        let row = sqlx::query(
            "SELECT p.id, p.user_id, p.content, p.media_url, p.perpetuate_boost, \
                    p.created_at, p.updated_at, u.handle AS author_handle, \
                    (SELECT COUNT(*) FROM likes WHERE post_id = p.id) AS likes_count, \
                    (SELECT COUNT(*) FROM comments WHERE post_id = p.id) AS comments_count, \
                    (SELECT COALESCE(SUM(trust_value), 0)::float8 FROM perpetuates WHERE post_id = p.id) AS trust_sum \
             FROM posts p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let tags = TagService::new(self.db.clone()).tags_for_post(post_id).await?;

        Ok(Some(PostDetail {
            post: post_from_row(&row),
            author_handle: row.get("author_handle"),
            likes_count: row.get("likes_count"),
            comments_count: row.get("comments_count"),
            trust_sum: row.get("trust_sum"),
            tags,
        }))
    }
}

fn post_from_row(row: &sqlx::postgres::PgRow) -> Post {
    Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        media_url: row.get("media_url"),
        perpetuate_boost: row.get("perpetuate_boost"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::error::CoreResult;
use crate::app::scoring;
use crate::config::tunables::RankingWeights;
use crate::domain::feed::{FeedItem, FeedPage, PostAggregate};
use crate::infra::db::Db;

pub const DEFAULT_FEED_PAGE: i64 = 25;
const MAX_FEED_PAGE: i64 = 50;

// Ranking reads only the numbers the score needs; post bodies are loaded
// for the selected page afterwards.
//
// Tag interest is weighted likes x1, comments x2, perpetuates x3, over all
// history. `similar_creator` only counts engagement with a different post
// by the same author.
const PERSONALIZED_SQL: &str = "\
    WITH touched AS ( \
        SELECT post_id, 1 AS weight FROM likes WHERE user_id = $1 \
        UNION ALL \
        SELECT post_id, 2 AS weight FROM comments WHERE user_id = $1 \
        UNION ALL \
        SELECT post_id, 3 AS weight FROM perpetuates WHERE user_id = $1 \
    ), \
    interest AS ( \
        SELECT pt.tag_id, SUM(t.weight)::float8 AS weight \
        FROM touched t \
        JOIN post_tags pt ON pt.post_id = t.post_id \
        GROUP BY pt.tag_id \
    ), \
    touched_authors AS ( \
        SELECT DISTINCT p.user_id AS author_id, p.id AS post_id \
        FROM touched t \
        JOIN posts p ON p.id = t.post_id \
    ) \
    SELECT p.id, p.perpetuate_boost, \
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count, \
           COALESCE(( \
               SELECT SUM(i.weight) FROM post_tags pt \
               JOIN interest i ON i.tag_id = pt.tag_id \
               WHERE pt.post_id = p.id \
           ), 0)::float8 AS interest_sum, \
           EXISTS ( \
               SELECT 1 FROM touched_authors ta \
               WHERE ta.author_id = p.user_id AND ta.post_id <> p.id \
           ) AS similar_creator, \
           EXISTS ( \
               SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1 \
           ) AS user_liked, \
           (EXTRACT(EPOCH FROM (now() - p.created_at)) / 3600.0)::float8 AS age_hours \
    FROM posts p \
    ORDER BY p.created_at DESC, p.id DESC";

const TRENDING_SQL: &str = "\
    SELECT p.id, p.perpetuate_boost, \
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count, \
           0::float8 AS interest_sum, \
           false AS similar_creator, \
           ($1::uuid IS NOT NULL AND EXISTS ( \
               SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1::uuid \
           )) AS user_liked, \
           (EXTRACT(EPOCH FROM (now() - p.created_at)) / 3600.0)::float8 AS age_hours \
    FROM posts p \
    ORDER BY p.created_at DESC, p.id DESC";

const PAGE_POSTS_SQL: &str = "\
    SELECT p.id, p.user_id, u.handle AS author_handle, p.content, p.media_url, p.created_at \
    FROM posts p \
    JOIN users u ON u.id = p.user_id \
    WHERE p.id = ANY($1)";

/// A post's ranking inputs and score, before its body is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ranked {
    id: Uuid,
    aggregate: PostAggregate,
    user_liked: bool,
    score: f64,
}

/// Ranked reads over the live aggregates. Nothing is cached between calls.
#[derive(Clone)]
pub struct FeedService {
    db: Db,
    weights: RankingWeights,
}

impl FeedService {
    pub fn new(db: Db, weights: RankingWeights) -> Self {
        Self { db, weights }
    }

    pub async fn get_feed_for(&self, user_id: Uuid, limit: i64, offset: i64) -> CoreResult<FeedPage> {
        let rows = sqlx::query(PERSONALIZED_SQL)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        let ranked = rank(&rows, |agg| scoring::personalized_score(agg, self.weights));
        self.page(ranked, limit, offset).await
    }

    /// `viewer` only drives the `user_liked` flag; ranking is the same for
    /// everyone.
    pub async fn get_trending(
        &self,
        viewer: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> CoreResult<FeedPage> {
        let rows = sqlx::query(TRENDING_SQL)
            .bind(viewer)
            .fetch_all(self.db.pool())
            .await?;

        let ranked = rank(&rows, |agg| scoring::trending_score(agg, self.weights));
        self.page(ranked, limit, offset).await
    }

    async fn page(&self, ranked: Vec<Ranked>, limit: i64, offset: i64) -> CoreResult<FeedPage> {
        let (limit, offset) = clamp_feed_page(Some(limit), Some(offset));
        let selected = window(ranked, limit, offset);
        if selected.is_empty() {
            return Ok(FeedPage {
                posts: Vec::new(),
                limit,
                offset,
            });
        }

        let ids: Vec<Uuid> = selected.iter().map(|entry| entry.id).collect();
        let rows = sqlx::query(PAGE_POSTS_SQL)
            .bind(&ids)
            .fetch_all(self.db.pool())
            .await?;
        let mut bodies: HashMap<Uuid, PgRow> = rows
            .into_iter()
            .map(|row| (row.get("id"), row))
            .collect();

        // a post deleted between the two reads is dropped from the page
        let posts = selected
            .into_iter()
            .filter_map(|entry| {
                bodies
                    .remove(&entry.id)
                    .map(|row| item_from_row(&row, &entry))
            })
            .collect();

        Ok(FeedPage {
            posts,
            limit,
            offset,
        })
    }
}

/// `limit` falls back to the default when absent, then is clamped to
/// [1, 50]; `offset` is floored at 0.
pub fn clamp_feed_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_FEED_PAGE).clamp(1, MAX_FEED_PAGE),
        offset.unwrap_or(0).max(0),
    )
}

fn rank<F>(rows: &[PgRow], score: F) -> Vec<Ranked>
where
    F: Fn(&PostAggregate) -> f64,
{
    let mut ranked: Vec<Ranked> = rows
        .iter()
        .map(|row| {
            let aggregate = aggregate_from_row(row);
            Ranked {
                id: row.get("id"),
                aggregate,
                user_liked: row.get("user_liked"),
                score: score(&aggregate),
            }
        })
        .collect();

    // stable, so equal scores keep newest-first from the query
    ranked.sort_by(|a, b| scoring::by_score_desc(a.score, b.score));
    ranked
}

fn window(ranked: Vec<Ranked>, limit: i64, offset: i64) -> Vec<Ranked> {
    ranked
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

fn aggregate_from_row(row: &PgRow) -> PostAggregate {
    let age_hours: f64 = row.get("age_hours");
    PostAggregate {
        likes: row.get("likes_count"),
        comments: row.get("comments_count"),
        trust_sum: row.get("perpetuate_boost"),
        interest_sum: row.get("interest_sum"),
        similar_creator: row.get("similar_creator"),
        age_hours: age_hours.max(0.0),
    }
}

fn item_from_row(row: &PgRow, entry: &Ranked) -> FeedItem {
    let agg = &entry.aggregate;
    FeedItem {
        id: entry.id,
        user_id: row.get("user_id"),
        author_handle: row.get("author_handle"),
        content: row.get("content"),
        media_url: row.get("media_url"),
        created_at: row.get("created_at"),
        likes_count: agg.likes,
        comments_count: agg.comments,
        trust_sum: agg.trust_sum,
        interest_sum: agg.interest_sum,
        similar_creator: agg.similar_creator,
        age_hours: agg.age_hours,
        score: entry.score,
        user_liked: entry.user_liked,
    }
}

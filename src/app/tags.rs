use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::app::error::CoreResult;
use crate::config::tunables::TagRules;
use crate::domain::tag::Tag;
use crate::infra::db::Db;

/// Normalize user-supplied tags.
///
/// Trims, strips leading `#`, lowercases, turns whitespace runs into `_`,
/// drops anything outside `[a-z0-9_]`, truncates, then de-duplicates in
/// first-seen order and keeps at most `rules.max_tags`. Clients previewing
/// tags must apply the same steps.
pub fn normalize_tags<S: AsRef<str>>(raw: &[S], rules: TagRules) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for input in raw {
        let tag = normalize_tag(input.as_ref(), rules.max_tag_length);
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        tags.push(tag);
        if tags.len() == rules.max_tags {
            break;
        }
    }
    tags
}

fn normalize_tag(input: &str, max_len: usize) -> String {
    let stripped = input.trim().trim_start_matches('#').trim();
    let mut out = String::with_capacity(stripped.len());
    let mut in_whitespace = false;
    for ch in stripped.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            out.push(ch);
        }
    }
    // only ASCII survives the filter, so byte truncation is char-safe
    out.truncate(max_len);
    out
}

#[derive(Clone)]
pub struct TagService {
    db: Db,
}

impl TagService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Get-or-create each name and return ids in the order given.
    pub async fn upsert_tags_with_tx(
        names: &[String],
        tx: &mut Transaction<'_, Postgres>,
    ) -> CoreResult<Vec<Uuid>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query(
            "INSERT INTO tags (name) \
             SELECT unnest($1::text[]) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(names)
        .execute(&mut **tx)
        .await?;

        let rows = sqlx::query(
            "SELECT t.id \
             FROM unnest($1::text[]) WITH ORDINALITY AS n(name, ord) \
             JOIN tags t ON t.name = n.name \
             ORDER BY n.ord",
        )
        .bind(names)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    pub async fn attach_tags_with_tx(
        post_id: Uuid,
        tag_ids: &[Uuid],
        tx: &mut Transaction<'_, Postgres>,
    ) -> CoreResult<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO post_tags (post_id, tag_id) \
             SELECT $1, x.tag_id FROM unnest($2::uuid[]) AS x(tag_id) \
             ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(tag_ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn tags_for_post(&self, post_id: Uuid) -> CoreResult<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT t.id, t.name \
             FROM tags t \
             JOIN post_tags pt ON pt.tag_id = t.id \
             WHERE pt.post_id = $1 \
             ORDER BY t.name",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        let tags = rows
            .into_iter()
            .map(|row| Tag {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect();

        Ok(tags)
    }
}

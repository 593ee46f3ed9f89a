use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

use crate::config::tunables::RetentionPolicy;
use crate::infra::db::Db;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub users_removed: u64,
    pub posts_adjusted: u64,
}

pub async fn run(db: Db, policy: RetentionPolicy) -> Result<()> {
    info!(
        inactive_days = policy.inactive_days,
        interval_seconds = policy.sweep_interval_seconds,
        "retention sweeper started"
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(policy.sweep_interval_seconds.max(1)));
    loop {
        ticker.tick().await;
        match sweep_inactive_users(&db, policy.inactive_days).await {
            Ok(report) => {
                if report.users_removed > 0 {
                    info!(
                        users_removed = report.users_removed,
                        posts_adjusted = report.posts_adjusted,
                        "removed inactive users"
                    );
                }
            }
            Err(err) => {
                error!(error = ?err, "retention sweep failed");
            }
        }
    }
}

/// Delete users whose `last_used` is older than `inactive_days`.
///
/// Their perpetuates on surviving posts are backed out of
/// `perpetuate_boost` first, in the same transaction, so the boost keeps
/// matching the rows that remain after the cascade.
pub async fn sweep_inactive_users(db: &Db, inactive_days: i64) -> Result<SweepReport> {
    let mut tx = db.begin().await?;

    // Posts before users, the same order perpetuate takes its locks in.
    sqlx::query(
        "SELECT p.id FROM posts p \
         WHERE p.id IN ( \
             SELECT pp.post_id FROM perpetuates pp \
             JOIN users u ON u.id = pp.user_id \
             WHERE u.last_used < now() - make_interval(days => $1::int) \
         ) \
         OR p.user_id IN ( \
             SELECT u.id FROM users u \
             WHERE u.last_used < now() - make_interval(days => $1::int) \
         ) \
         ORDER BY p.id \
         FOR UPDATE OF p",
    )
    .bind(inactive_days)
    .execute(&mut *tx)
    .await?;

    let doomed: Vec<uuid::Uuid> = sqlx::query_scalar(
        "SELECT id FROM users \
         WHERE last_used < now() - make_interval(days => $1::int) \
         ORDER BY id \
         FOR UPDATE",
    )
    .bind(inactive_days)
    .fetch_all(&mut *tx)
    .await?;

    if doomed.is_empty() {
        tx.rollback().await?;
        return Ok(SweepReport::default());
    }

    let adjusted = sqlx::query(
        "UPDATE posts p \
         SET perpetuate_boost = p.perpetuate_boost - gone.total \
         FROM ( \
             SELECT post_id, SUM(trust_value) AS total \
             FROM perpetuates \
             WHERE user_id = ANY($1) \
             GROUP BY post_id \
         ) gone \
         WHERE p.id = gone.post_id AND p.user_id <> ALL($1)",
    )
    .bind(&doomed)
    .execute(&mut *tx)
    .await?;

    let removed = sqlx::query("DELETE FROM users WHERE id = ANY($1)")
        .bind(&doomed)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(SweepReport {
        users_removed: removed.rows_affected(),
        posts_adjusted: adjusted.rows_affected(),
    })
}

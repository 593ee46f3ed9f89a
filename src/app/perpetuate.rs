use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::app::engagement::EngagementService;
use crate::app::error::{CoreError, CoreResult};
use crate::app::scoring;
use crate::app::users::UserService;
use crate::config::tunables::{EngagementRules, PerpetuateRules};
use crate::domain::engagement::PerpetuateOutcome;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PerpetuateService {
    db: Db,
    engagement: EngagementService,
    rules: PerpetuateRules,
}

impl PerpetuateService {
    pub fn new(db: Db, rules: PerpetuateRules, engagement_rules: EngagementRules) -> Self {
        Self {
            engagement: EngagementService::new(db.clone(), engagement_rules),
            db,
            rules,
        }
    }

    /// Cap on the raw value this user may currently submit.
    pub async fn max_allowed(
        &self,
        user_id: Uuid,
        account_created_at: OffsetDateTime,
    ) -> CoreResult<f64> {
        let comments = self.engagement.lifetime_comment_count(user_id).await?;
        let age_days = scoring::account_age_days(account_created_at, OffsetDateTime::now_utc());
        Ok(scoring::perpetuate_cap(age_days, comments, self.rules))
    }

    /// Record (or replace) the user's endorsement of a post.
    ///
    /// The raw value is scaled by the user's trust score, and the post's
    /// `perpetuate_boost` moves by the difference between the new and the
    /// previously committed trust value. The post row is locked for the
    /// duration, so concurrent endorsements of one post apply their deltas
    /// one at a time.
    pub async fn perpetuate(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        raw_value: f64,
        account_created_at: OffsetDateTime,
    ) -> CoreResult<PerpetuateOutcome> {
        if !raw_value.is_finite() || raw_value <= 0.0 {
            return Err(CoreError::invalid("perpetuate value must be a positive number"));
        }

        let engagement_score = self.engagement.compute_engagement_score(user_id).await?;
        let comments = self.engagement.lifetime_comment_count(user_id).await?;
        let age_days = scoring::account_age_days(account_created_at, OffsetDateTime::now_utc());

        let max_allowed = scoring::perpetuate_cap(age_days, comments, self.rules);
        if raw_value > max_allowed {
            return Err(CoreError::MaxExceeded { max_allowed });
        }

        let trust_score = scoring::trust_score(age_days, engagement_score);
        let trust_value = raw_value * trust_score;

        let mut tx = self.db.begin().await?;

        let post: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        if post.is_none() {
            tx.rollback().await?;
            return Err(CoreError::not_found("post not found"));
        }

        let previous: Option<f64> = sqlx::query_scalar(
            "SELECT trust_value FROM perpetuates \
             WHERE post_id = $1 AND user_id = $2 \
             FOR UPDATE",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO perpetuates (post_id, user_id, value, trust_value) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (post_id, user_id) DO UPDATE \
             SET value = EXCLUDED.value, \
                 trust_value = EXCLUDED.trust_value, \
                 created_at = now()",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(raw_value)
        .bind(trust_value)
        .execute(&mut *tx)
        .await?;

        let delta = trust_value - previous.unwrap_or(0.0);
        if delta != 0.0 {
            sqlx::query(
                "UPDATE posts SET perpetuate_boost = perpetuate_boost + $1 WHERE id = $2",
            )
            .bind(delta)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        }

        UserService::touch_last_used_with_tx(user_id, &mut tx).await?;

        tx.commit().await?;

        debug!(
            post_id = %post_id,
            user_id = %user_id,
            raw_value,
            trust_value,
            delta,
            "perpetuate recorded"
        );

        Ok(PerpetuateOutcome {
            trust_score,
            trust_value,
            max_allowed,
        })
    }
}

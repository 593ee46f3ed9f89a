use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::app::engagement::EngagementService;
use crate::app::error::{CoreError, CoreResult};
use crate::app::scoring;
use crate::config::tunables::{EligibilityOverride, EligibilityRules, EngagementRules};
use crate::infra::db::Db;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eligibility {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub engagement_score: f64,
    pub account_age_days: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct EligibilityInputs {
    pub account_age_days: i64,
    pub lifetime_comments: i64,
    pub engagement_score: f64,
}

/// Where a bypass of the gate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideSource {
    AllowList,
    RequestFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PostingDecision {
    Allowed,
    Bypassed { source: OverrideSource, reason: String },
    Denied { reason: String },
}

impl PostingDecision {
    /// `Ok(true)` when the post goes through on an override.
    pub fn into_permit(self) -> CoreResult<bool> {
        match self {
            PostingDecision::Allowed => Ok(false),
            PostingDecision::Bypassed { .. } => Ok(true),
            PostingDecision::Denied { reason } => Err(CoreError::Forbidden { reason }),
        }
    }
}

/// Unlock, then minimum age, then minimum engagement; the first failing
/// check supplies the reason.
pub fn evaluate(inputs: EligibilityInputs, rules: EligibilityRules) -> Eligibility {
    let deny = |reason: String| Eligibility {
        ok: false,
        reason: Some(reason),
        engagement_score: inputs.engagement_score,
        account_age_days: inputs.account_age_days,
    };

    let unlocked = inputs.account_age_days >= rules.posting_unlock_days
        || inputs.lifetime_comments >= rules.min_comments_to_unlock;
    if !unlocked {
        return deny(format!(
            "Posting locked. Comment more or wait {} days.",
            rules.posting_unlock_days
        ));
    }
    if inputs.account_age_days < rules.min_account_age_days {
        return deny(format!(
            "Account must be at least {} day(s) old.",
            rules.min_account_age_days
        ));
    }
    if inputs.engagement_score < rules.min_engagement_score {
        return deny(format!(
            "Insufficient engagement score ({}).",
            rules.min_engagement_score
        ));
    }

    Eligibility {
        ok: true,
        reason: None,
        engagement_score: inputs.engagement_score,
        account_age_days: inputs.account_age_days,
    }
}

pub fn override_source(
    policy: &EligibilityOverride,
    user_id: Uuid,
    request_flag: bool,
) -> Option<OverrideSource> {
    if policy.enabled && (policy.user_ids.is_empty() || policy.user_ids.contains(&user_id)) {
        return Some(OverrideSource::AllowList);
    }
    if policy.allow_request_flag && request_flag {
        return Some(OverrideSource::RequestFlag);
    }
    None
}

#[derive(Clone)]
pub struct EligibilityService {
    engagement: EngagementService,
    rules: EligibilityRules,
    policy: EligibilityOverride,
}

impl EligibilityService {
    pub fn new(
        db: Db,
        rules: EligibilityRules,
        policy: EligibilityOverride,
        engagement_rules: EngagementRules,
    ) -> Self {
        Self {
            engagement: EngagementService::new(db, engagement_rules),
            rules,
            policy,
        }
    }

    pub async fn can_user_post(
        &self,
        user_id: Uuid,
        account_created_at: OffsetDateTime,
    ) -> CoreResult<Eligibility> {
        let engagement_score = self.engagement.compute_engagement_score(user_id).await?;
        let lifetime_comments = self.engagement.lifetime_comment_count(user_id).await?;
        let inputs = EligibilityInputs {
            account_age_days: scoring::account_age_days(
                account_created_at,
                OffsetDateTime::now_utc(),
            ),
            lifetime_comments,
            engagement_score,
        };
        Ok(evaluate(inputs, self.rules))
    }

    /// Run the gate and, when it fails, consult the override policy.
    ///
    /// A bypass is logged on the audit target so it never looks like a
    /// normal pass.
    pub async fn check_posting(
        &self,
        user_id: Uuid,
        account_created_at: OffsetDateTime,
        request_flag: bool,
    ) -> CoreResult<(Eligibility, PostingDecision)> {
        let eligibility = self.can_user_post(user_id, account_created_at).await?;
        if eligibility.ok {
            return Ok((eligibility, PostingDecision::Allowed));
        }

        let reason = eligibility.reason.clone().unwrap_or_default();
        let decision = match override_source(&self.policy, user_id, request_flag) {
            Some(source) => {
                warn!(
                    target: "perpetua::audit",
                    user_id = %user_id,
                    source = ?source,
                    reason = %reason,
                    "posting eligibility bypassed"
                );
                PostingDecision::Bypassed { source, reason }
            }
            None => PostingDecision::Denied { reason },
        };

        Ok((eligibility, decision))
    }

    /// Gate a post creation. A denial comes back as `Forbidden` carrying
    /// the gate's reason; `Ok(true)` marks a bypassed gate.
    pub async fn require_posting(
        &self,
        user_id: Uuid,
        account_created_at: OffsetDateTime,
        request_flag: bool,
    ) -> CoreResult<bool> {
        let (_, decision) = self
            .check_posting(user_id, account_created_at, request_flag)
            .await?;
        decision.into_permit()
    }
}

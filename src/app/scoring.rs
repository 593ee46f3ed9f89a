//! Scoring law shared by the engagement, endorsement and feed services.
//!
//! Everything here is pure arithmetic over plain records; the services fetch
//! the inputs and apply these functions, so the numbers can be checked without
//! a database.

use std::cmp::Ordering;

use time::OffsetDateTime;

use crate::config::tunables::{PerpetuateRules, RankingWeights};
use crate::domain::engagement::EngagementCounts;
use crate::domain::feed::PostAggregate;

pub const LIKE_ENGAGEMENT_WEIGHT: f64 = 0.5;
pub const COMMENT_ENGAGEMENT_WEIGHT: f64 = 1.0;
pub const PERPETUATE_ENGAGEMENT_WEIGHT: f64 = 1.5;

/// Engagement score at which the trust engagement factor saturates.
pub const ENGAGEMENT_SATURATION: f64 = 5.0;
/// Account age (days) at which the trust age factor saturates.
pub const AGE_SATURATION_DAYS: f64 = 14.0;

pub fn engagement_score(counts: EngagementCounts) -> f64 {
    LIKE_ENGAGEMENT_WEIGHT * counts.likes as f64
        + COMMENT_ENGAGEMENT_WEIGHT * counts.comments as f64
        + PERPETUATE_ENGAGEMENT_WEIGHT * counts.perpetuates as f64
}

/// Whole days elapsed since `created_at`, never negative.
pub fn account_age_days(created_at: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (now - created_at).whole_days().max(0)
}

/// Trust in [0, 1]: the product of an age factor and an engagement factor,
/// each saturating at 1.
pub fn trust_score(account_age_days: i64, engagement_score: f64) -> f64 {
    let age_factor = (account_age_days as f64 / AGE_SATURATION_DAYS).clamp(0.0, 1.0);
    let engagement_factor = (engagement_score / ENGAGEMENT_SATURATION).clamp(0.0, 1.0);
    age_factor * engagement_factor
}

/// Largest raw value a user may submit: one extra unit per full week of
/// account age and per five lifetime comments, bounded by the hard cap.
pub fn perpetuate_cap(account_age_days: i64, lifetime_comments: i64, rules: PerpetuateRules) -> f64 {
    let age_bonus = (account_age_days.max(0) / 7) as f64;
    let comment_bonus = (lifetime_comments.max(0) / 5) as f64;
    let max = rules.base_max + age_bonus + comment_bonus;
    max.max(rules.base_max).min(rules.hard_cap)
}

pub fn decay_penalty(age_hours: f64, decay_factor: f64) -> f64 {
    age_hours.max(0.0).powf(decay_factor)
}

pub fn personalized_score(agg: &PostAggregate, weights: RankingWeights) -> f64 {
    let creator_bonus = if agg.similar_creator {
        weights.similar_creator_bonus
    } else {
        0.0
    };
    agg.likes as f64 * 1.0
        + agg.comments as f64 * 1.5
        + agg.trust_sum * weights.perpetuate_weight
        + agg.interest_sum * weights.interest_factor
        + creator_bonus
        - decay_penalty(agg.age_hours, weights.decay_factor)
}

pub fn trending_score(agg: &PostAggregate, weights: RankingWeights) -> f64 {
    agg.likes as f64 * 1.5
        + agg.comments as f64 * 2.0
        + agg.trust_sum * weights.perpetuate_weight
        - decay_penalty(agg.age_hours, weights.decay_factor)
}

/// Descending by score; NaN sorts after every real score.
pub fn by_score_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

use anyhow::{anyhow, Result};
use serde::Serialize;
use uuid::Uuid;

use super::{env_flag, env_or, env_or_parse};

/// Every threshold, weight and cap the scoring code consults.
///
/// Built once at startup and handed to services by value, so the algorithms
/// can be exercised with arbitrary settings in tests.
#[derive(Debug, Clone, Default)]
pub struct Tunables {
    pub eligibility: EligibilityRules,
    pub bypass: EligibilityOverride,
    pub perpetuate: PerpetuateRules,
    pub engagement: EngagementRules,
    pub ranking: RankingWeights,
    pub tags: TagRules,
    pub retention: RetentionPolicy,
}

impl Tunables {
    pub fn from_env(production: bool) -> Result<Self> {
        let tunables = Self {
            eligibility: EligibilityRules {
                posting_unlock_days: env_or_parse("POSTING_UNLOCK_DAYS", "3")?,
                min_comments_to_unlock: env_or_parse("MIN_COMMENTS_TO_UNLOCK", "3")?,
                min_account_age_days: env_or_parse("MIN_ACCOUNT_AGE_DAYS_TO_POST", "1")?,
                min_engagement_score: env_or_parse("MIN_ENGAGEMENT_SCORE_TO_POST", "2.0")?,
            },
            bypass: EligibilityOverride {
                enabled: env_flag("POSTING_BYPASS_ENABLE"),
                user_ids: parse_user_ids(&env_or("POSTING_BYPASS_USER_IDS", ""))?,
                allow_request_flag: !production,
            },
            perpetuate: PerpetuateRules {
                base_max: env_or_parse("PERP_BASE_MAX", "5")?,
                hard_cap: env_or_parse("PERP_HARD_CAP", "100")?,
            },
            engagement: EngagementRules {
                window_days: env_or_parse("ENGAGEMENT_WINDOW_DAYS", "30")?,
            },
            ranking: RankingWeights {
                interest_factor: env_or_parse("INTEREST_FACTOR", "0.2")?,
                similar_creator_bonus: env_or_parse("SIMILAR_CREATOR_BONUS", "1")?,
                decay_factor: env_or_parse("DECAY_FACTOR", "1.2")?,
                perpetuate_weight: env_or_parse("PERPETUATE_WEIGHT", "3.0")?,
            },
            tags: TagRules {
                max_tags: env_or_parse("MAX_TAGS", "5")?,
                max_tag_length: env_or_parse("MAX_TAG_LENGTH", "30")?,
            },
            retention: RetentionPolicy {
                inactive_days: env_or_parse("RETENTION_INACTIVE_DAYS", "3")?,
                sweep_interval_seconds: env_or_parse("RETENTION_SWEEP_INTERVAL_SECONDS", "86400")?,
            },
        };
        tunables.validate()?;
        Ok(tunables)
    }

    fn validate(&self) -> Result<()> {
        let floats = [
            ("MIN_ENGAGEMENT_SCORE_TO_POST", self.eligibility.min_engagement_score),
            ("PERP_BASE_MAX", self.perpetuate.base_max),
            ("PERP_HARD_CAP", self.perpetuate.hard_cap),
            ("INTEREST_FACTOR", self.ranking.interest_factor),
            ("SIMILAR_CREATOR_BONUS", self.ranking.similar_creator_bonus),
            ("DECAY_FACTOR", self.ranking.decay_factor),
            ("PERPETUATE_WEIGHT", self.ranking.perpetuate_weight),
        ];
        for (key, value) in floats {
            if !value.is_finite() {
                return Err(anyhow!("invalid {}: must be finite", key));
            }
        }
        if self.perpetuate.base_max <= 0.0 {
            return Err(anyhow!("invalid PERP_BASE_MAX: must be positive"));
        }
        if self.tags.max_tags == 0 || self.tags.max_tag_length == 0 {
            return Err(anyhow!("invalid MAX_TAGS/MAX_TAG_LENGTH: must be positive"));
        }
        if self.engagement.window_days <= 0 {
            return Err(anyhow!("invalid ENGAGEMENT_WINDOW_DAYS: must be positive"));
        }
        Ok(())
    }
}

/// Thresholds for the posting eligibility gate.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EligibilityRules {
    pub posting_unlock_days: i64,
    pub min_comments_to_unlock: i64,
    pub min_account_age_days: i64,
    pub min_engagement_score: f64,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            posting_unlock_days: 3,
            min_comments_to_unlock: 3,
            min_account_age_days: 1,
            min_engagement_score: 2.0,
        }
    }
}

/// Operational escape hatch around the eligibility gate.
///
/// An empty `user_ids` list with `enabled` set lets every account through.
/// `allow_request_flag` is only ever true outside production.
#[derive(Debug, Clone, Default)]
pub struct EligibilityOverride {
    pub enabled: bool,
    pub user_ids: Vec<Uuid>,
    pub allow_request_flag: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PerpetuateRules {
    pub base_max: f64,
    pub hard_cap: f64,
}

impl Default for PerpetuateRules {
    fn default() -> Self {
        Self {
            base_max: 5.0,
            hard_cap: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngagementRules {
    pub window_days: i64,
}

impl Default for EngagementRules {
    fn default() -> Self {
        Self { window_days: 30 }
    }
}

/// Feed ranking weights.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RankingWeights {
    pub interest_factor: f64,
    pub similar_creator_bonus: f64,
    pub decay_factor: f64,
    pub perpetuate_weight: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            interest_factor: 0.2,
            similar_creator_bonus: 1.0,
            decay_factor: 1.2,
            perpetuate_weight: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TagRules {
    pub max_tags: usize,
    pub max_tag_length: usize,
}

impl Default for TagRules {
    fn default() -> Self {
        Self {
            max_tags: 5,
            max_tag_length: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RetentionPolicy {
    pub inactive_days: i64,
    pub sweep_interval_seconds: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            inactive_days: 3,
            sweep_interval_seconds: 86_400,
        }
    }
}

fn parse_user_ids(raw: &str) -> Result<Vec<Uuid>> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            Uuid::parse_str(value)
                .map_err(|err| anyhow!("invalid POSTING_BYPASS_USER_IDS entry {}: {}", value, err))
        })
        .collect()
}

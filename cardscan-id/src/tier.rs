// Tier Selector
//
// Maps (quality score, caller options) to a processing tier. Total and
// deterministic; never fails.
//
// Rules, in order:
// 1. prefer_speed                          -> fast
// 2. time budget <= tight budget           -> fast
// 3. prefer_quality                        -> enhanced
// 4. score below caller's quality floor    -> enhanced
// 5. score bands: >= 80 fast, 50-79 standard, < 50 enhanced
// 6. budget <= standard budget caps the result at standard

use crate::config::{SelectionConfig, TierTable};
use crate::types::{ProcessingTier, ScanOptions, TierProfile};
use serde::{Deserialize, Serialize};

/// Why a tier was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierReason {
    PreferSpeed,
    TightBudget,
    PreferQuality,
    BelowQualityThreshold,
    QualityBand,
    BudgetCapped,
}

impl TierReason {
    pub fn describe(self) -> &'static str {
        match self {
            Self::PreferSpeed => "caller prefers speed",
            Self::TightBudget => "time budget too tight for slower tiers",
            Self::PreferQuality => "caller prefers quality",
            Self::BelowQualityThreshold => "quality below caller's threshold",
            Self::QualityBand => "quality score band",
            Self::BudgetCapped => "time budget caps tier at standard",
        }
    }
}

/// Selected tier with the profile to run it
#[derive(Debug, Clone, PartialEq)]
pub struct TierSelection {
    pub profile: TierProfile,
    pub reason: TierReason,
}

/// Tier selector
pub struct TierSelector {
    selection: SelectionConfig,
    tiers: TierTable,
}

impl Default for TierSelector {
    fn default() -> Self {
        Self::new(SelectionConfig::default(), TierTable::default())
    }
}

impl TierSelector {
    pub fn new(selection: SelectionConfig, tiers: TierTable) -> Self {
        Self { selection, tiers }
    }

    /// Tier only, without the profile
    pub fn choose(&self, score: u8, options: &ScanOptions) -> (ProcessingTier, TierReason) {
        let cfg = &self.selection;
        let budget = options.time_budget_ms;

        if options.prefer_speed {
            return (ProcessingTier::Fast, TierReason::PreferSpeed);
        }
        if budget.is_some_and(|b| b <= cfg.tight_budget_ms) {
            return (ProcessingTier::Fast, TierReason::TightBudget);
        }

        let below_floor = options.quality_threshold.is_some_and(|floor| score < floor);
        let (tier, reason) = if options.prefer_quality {
            (ProcessingTier::Enhanced, TierReason::PreferQuality)
        } else if below_floor {
            (ProcessingTier::Enhanced, TierReason::BelowQualityThreshold)
        } else if score >= cfg.fast_min_score {
            (ProcessingTier::Fast, TierReason::QualityBand)
        } else if score >= cfg.standard_min_score {
            (ProcessingTier::Standard, TierReason::QualityBand)
        } else {
            (ProcessingTier::Enhanced, TierReason::QualityBand)
        };

        if tier > ProcessingTier::Standard && budget.is_some_and(|b| b <= cfg.standard_budget_ms) {
            return (ProcessingTier::Standard, TierReason::BudgetCapped);
        }

        (tier, reason)
    }

    pub fn select(&self, score: u8, options: &ScanOptions) -> TierSelection {
        let (tier, reason) = self.choose(score, options);
        tracing::debug!(score, tier = %tier, reason = reason.describe(), "Tier selected");
        TierSelection {
            profile: self.tiers.profile(tier),
            reason,
        }
    }
}

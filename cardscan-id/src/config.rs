//! Scan configuration
//!
//! Every tuning constant of the pipeline lives here: quality weights, the
//! tier table, tier selection bands, search fan-out limits, scoring weights
//! and decision thresholds, retry policy and cost rates.
//!
//! A `ScanConfig` is built once (defaults, optionally overridden by the
//! `[scan]` table of the TOML config), validated, and then shared read-only
//! by every request. Nothing in the pipeline reads process-wide state.

use crate::error::{Result, ScanError};
use crate::types::{ProcessingTier, TierProfile};
use serde::{Deserialize, Serialize};

/// Quality assessment weights and issue thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub blur_weight: f32,
    pub resolution_weight: f32,
    pub exposure_weight: f32,
    /// Short side at or below which resolution scores 0
    pub min_dimension: u32,
    /// Short side at or above which resolution scores 100
    pub comfortable_dimension: u32,
    pub blur_issue_below: f32,
    pub resolution_issue_below: f32,
    pub exposure_issue_below: f32,
    /// Brightness below this counts as underexposed
    pub dark_level: u8,
    /// Brightness at or above this counts as overexposed
    pub bright_level: u8,
    /// Luma above this counts as a specular highlight
    pub glare_luma: u8,
    /// Highlight fraction above which glare is reported
    pub glare_fraction: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            blur_weight: 0.65,
            resolution_weight: 0.10,
            exposure_weight: 0.25,
            min_dimension: 150,
            comfortable_dimension: 400,
            blur_issue_below: 60.0,
            resolution_issue_below: 50.0,
            exposure_issue_below: 50.0,
            dark_level: 40,
            bright_level: 220,
            glare_luma: 240,
            glare_fraction: 0.10,
        }
    }
}

/// Tier parameters without the tier tag (the table key supplies it)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSettings {
    pub max_dimension: u32,
    pub model_variant: String,
    pub target_latency_ms: u64,
    pub max_output_tokens: u32,
}

/// The fixed three-row tier table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub fast: TierSettings,
    pub standard: TierSettings,
    pub enhanced: TierSettings,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            fast: TierSettings {
                max_dimension: 512,
                model_variant: "gemini-2.5-flash".to_string(),
                target_latency_ms: 1000,
                max_output_tokens: 256,
            },
            standard: TierSettings {
                max_dimension: 768,
                model_variant: "gemini-2.5-flash".to_string(),
                target_latency_ms: 2000,
                max_output_tokens: 2000,
            },
            enhanced: TierSettings {
                max_dimension: 1024,
                model_variant: "gemini-2.5-flash".to_string(),
                target_latency_ms: 4000,
                max_output_tokens: 4000,
            },
        }
    }
}

impl TierTable {
    pub fn settings(&self, tier: ProcessingTier) -> &TierSettings {
        match tier {
            ProcessingTier::Fast => &self.fast,
            ProcessingTier::Standard => &self.standard,
            ProcessingTier::Enhanced => &self.enhanced,
        }
    }

    pub fn profile(&self, tier: ProcessingTier) -> TierProfile {
        let s = self.settings(tier);
        TierProfile {
            tier,
            max_dimension: s.max_dimension,
            model_variant: s.model_variant.clone(),
            target_latency_ms: s.target_latency_ms,
            max_output_tokens: s.max_output_tokens,
        }
    }
}

/// Quality bands and budget thresholds for tier selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub fast_min_score: u8,
    pub standard_min_score: u8,
    /// Budgets at or below this force the fast tier
    pub tight_budget_ms: u64,
    /// Budgets at or below this cap the choice at the standard tier
    pub standard_budget_ms: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fast_min_score: 80,
            standard_min_score: 50,
            tight_budget_ms: 1500,
            standard_budget_ms: 2500,
        }
    }
}

/// Candidate search limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub page_size: u32,
    /// Per-query timeout as a multiple of the tier's target latency
    pub query_timeout_factor: f64,
    /// Upper bound on concurrent set-family queries
    pub max_family_queries: usize,
    /// Try a prefix search on the name when every other level came back empty
    pub enable_wildcard: bool,
    /// Local rate limit for the card database client
    pub requests_per_second: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            query_timeout_factor: 2.0,
            max_family_queries: 8,
            enable_wildcard: true,
            requests_per_second: 5,
        }
    }
}

/// Points awarded (or deducted) by each scoring factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub name_exact: i32,
    pub name_fuzzy: i32,
    pub number_exact: i32,
    pub number_partial: i32,
    pub set_exact: i32,
    pub set_family: i32,
    pub team_mismatch: i32,
    pub mechanic_mismatch: i32,
    pub rarity: i32,
    pub hp: i32,
    pub types_match: i32,
    pub types_conflict: i32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            name_exact: 20,
            name_fuzzy: 10,
            number_exact: 45,
            number_partial: 20,
            set_exact: 35,
            set_family: 15,
            team_mismatch: -30,
            mechanic_mismatch: -15,
            rarity: 5,
            hp: 5,
            types_match: 5,
            types_conflict: -10,
        }
    }
}

/// Decision thresholds for the match scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub weights: MatchWeights,
    pub required_score: i32,
    pub high_confidence: i32,
    pub medium_confidence: i32,
    /// Normalized Levenshtein similarity that counts as a fuzzy name match
    pub fuzzy_name_similarity: f64,
    pub max_alternatives: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            required_score: 60,
            high_confidence: 75,
            medium_confidence: 45,
            fuzzy_name_similarity: 0.85,
            max_alternatives: 5,
        }
    }
}

/// Retry and timeout policy for the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extra vision attempts per scan, shared by error retries and tier upgrades
    pub retry_budget: u32,
    /// Vision call timeout as a multiple of the tier's target latency
    pub call_timeout_factor: f64,
    /// Soft budget as a multiple of the tier's target latency, when the
    /// caller gave no explicit budget. 1.0 holds the scan to the target.
    pub soft_budget_factor: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_budget: 1,
            call_timeout_factor: 4.0,
            soft_budget_factor: 1.0,
        }
    }
}

/// Vision model pricing (USD)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub input_per_1k_tokens: f64,
    pub output_per_1k_tokens: f64,
    pub per_image: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            input_per_1k_tokens: 0.00015,
            output_per_1k_tokens: 0.0006,
            per_image: 0.0025,
        }
    }
}

/// Complete immutable configuration for a scan pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub quality: QualityConfig,
    pub tiers: TierTable,
    pub selection: SelectionConfig,
    pub search: SearchConfig,
    pub matching: MatchConfig,
    pub pipeline: PipelineConfig,
    pub cost: CostConfig,
}

impl ScanConfig {
    /// Build from the `[scan]` table of a TOML config, then validate
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        let config: ScanConfig = toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e| ScanError::Config(format!("Invalid [scan] table: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break pipeline invariants
    pub fn validate(&self) -> Result<()> {
        let q = &self.quality;
        let weights = [q.blur_weight, q.resolution_weight, q.exposure_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ScanError::Config("quality weights must be non-negative".into()));
        }
        let sum: f32 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-3 {
            return Err(ScanError::Config(format!(
                "quality weights must sum to 1.0 (got {:.3})",
                sum
            )));
        }
        if q.min_dimension >= q.comfortable_dimension {
            return Err(ScanError::Config(
                "quality.min_dimension must be below quality.comfortable_dimension".into(),
            ));
        }

        let s = &self.selection;
        if s.standard_min_score > s.fast_min_score {
            return Err(ScanError::Config(
                "selection.standard_min_score must not exceed selection.fast_min_score".into(),
            ));
        }
        if s.tight_budget_ms > s.standard_budget_ms {
            return Err(ScanError::Config(
                "selection.tight_budget_ms must not exceed selection.standard_budget_ms".into(),
            ));
        }

        for pair in ProcessingTier::ALL.windows(2) {
            let (lo, hi) = (self.tiers.settings(pair[0]), self.tiers.settings(pair[1]));
            if lo.max_dimension > hi.max_dimension || lo.target_latency_ms > hi.target_latency_ms {
                return Err(ScanError::Config(format!(
                    "tier '{}' must not be larger or slower than tier '{}'",
                    pair[0], pair[1]
                )));
            }
        }
        for tier in ProcessingTier::ALL {
            let t = self.tiers.settings(tier);
            if t.max_dimension == 0 || t.target_latency_ms == 0 || t.model_variant.trim().is_empty() {
                return Err(ScanError::Config(format!("tier '{}' is incomplete", tier)));
            }
        }

        let m = &self.matching;
        if m.required_score <= 0 {
            return Err(ScanError::Config("matching.required_score must be positive".into()));
        }
        if m.medium_confidence > m.high_confidence {
            return Err(ScanError::Config(
                "matching.medium_confidence must not exceed matching.high_confidence".into(),
            ));
        }
        if !(0.0..=1.0).contains(&m.fuzzy_name_similarity) {
            return Err(ScanError::Config(
                "matching.fuzzy_name_similarity must be within [0, 1]".into(),
            ));
        }

        let factors = [
            self.pipeline.call_timeout_factor,
            self.pipeline.soft_budget_factor,
            self.search.query_timeout_factor,
        ];
        if factors.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
            return Err(ScanError::Config("timeout factors must be positive".into()));
        }

        if self.search.page_size == 0 {
            return Err(ScanError::Config("search.page_size must be at least 1".into()));
        }
        if self.search.requests_per_second == 0 {
            return Err(ScanError::Config(
                "search.requests_per_second must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

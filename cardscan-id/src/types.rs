// Shared Types and Data Contracts
//
// Every stage of the scan pipeline hands one of these values to the next.
// All of them serialize to JSON so a route layer can return a ScanResult
// as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CostConfig;

// ============================================================================
// Request Options
// ============================================================================

/// Caller preferences for a single scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Always use the fast tier
    pub prefer_speed: bool,
    /// Use the enhanced tier unless speed or a tight budget forces otherwise
    pub prefer_quality: bool,
    /// Soft end-to-end time budget
    pub time_budget_ms: Option<u64>,
    /// Quality score below which the scan escalates to the enhanced tier
    pub quality_threshold: Option<u8>,
}

// ============================================================================
// Quality Assessment
// ============================================================================

/// Per-metric sub-scores behind a quality score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Sharpness sub-score, 0-100
    pub blur: f32,
    /// Resolution sub-score, 0-100
    pub resolution: f32,
    /// Exposure sub-score, 0-100
    pub exposure: f32,
    /// Fraction of glare pixels in [0, 1]; reported, never scored
    pub glare_fraction: f32,
}

/// Coarse label for a quality score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Self::Excellent,
            60..=79 => Self::Good,
            40..=59 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

/// Output of the quality assessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Weighted quality score, 0-100
    pub score: u8,
    pub rating: QualityRating,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub metrics: QualityMetrics,
}

// ============================================================================
// Processing Tiers
// ============================================================================

/// Processing tier, ordered from cheapest to most thorough
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingTier {
    Fast,
    Standard,
    Enhanced,
}

impl ProcessingTier {
    pub const ALL: [ProcessingTier; 3] = [Self::Fast, Self::Standard, Self::Enhanced];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Standard => "standard",
            Self::Enhanced => "enhanced",
        }
    }

    /// Next cheaper tier, if any
    pub fn cheaper(self) -> Option<Self> {
        match self {
            Self::Fast => None,
            Self::Standard => Some(Self::Fast),
            Self::Enhanced => Some(Self::Standard),
        }
    }

    /// Next more thorough tier, if any
    pub fn richer(self) -> Option<Self> {
        match self {
            Self::Fast => Some(Self::Standard),
            Self::Standard => Some(Self::Enhanced),
            Self::Enhanced => None,
        }
    }
}

impl std::fmt::Display for ProcessingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the pipeline needs to run a request at one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProfile {
    pub tier: ProcessingTier,
    /// Longest image side sent to the vision model
    pub max_dimension: u32,
    pub model_variant: String,
    /// Soft latency target for the vision call
    pub target_latency_ms: u64,
    pub max_output_tokens: u32,
}

// ============================================================================
// Identification (vision model output, parsed)
// ============================================================================

/// Token counts reported by the vision model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub response: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt = self.prompt.saturating_add(other.prompt);
        self.response = self.response.saturating_add(other.response);
    }
}

/// Which extraction strategy produced an identification record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    StrictJson,
    DelimitedBlock,
    LenientKeyValue,
}

/// Typed card fields parsed from the vision model's text
///
/// `confidence` is the parser's certainty about the extraction, not the
/// model's certainty about the card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentificationRecord {
    /// Name as printed on the card (original language)
    pub name: Option<String>,
    pub set_name: Option<String>,
    pub number: Option<String>,
    /// Printed set size, from numbers like "4/102"
    pub set_total: Option<u32>,
    pub hp: Option<String>,
    pub rarity: Option<String>,
    pub types: Vec<String>,
    /// Parse confidence in [0, 1]; 0 means nothing usable was read
    pub confidence: f32,
    pub detected_language: String,
    /// English name when the card is not in English
    pub translated_name: Option<String>,
    pub token_usage: TokenUsage,
    pub raw_text: String,
    pub strategy: Option<ParseStrategy>,
    /// Fields whose values carried hedging language ("likely", "possibly")
    pub vague_fields: Vec<String>,
}

impl IdentificationRecord {
    /// Name to use for catalog lookups (English when known)
    pub fn search_name(&self) -> Option<&str> {
        self.translated_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    /// True when no identifying field was extracted
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.set_name.is_none() && self.number.is_none()
    }
}

// ============================================================================
// Catalog Candidates
// ============================================================================

/// Market prices for the preferred printing of a card (USD)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketPrices {
    pub low: Option<f64>,
    pub mid: Option<f64>,
    pub high: Option<f64>,
    pub market: Option<f64>,
}

/// A card record returned by the card database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateCard {
    pub id: String,
    pub name: String,
    pub set_name: Option<String>,
    pub set_total: Option<u32>,
    pub number: Option<String>,
    pub hp: Option<String>,
    pub rarity: Option<String>,
    pub types: Vec<String>,
    pub image_url: Option<String>,
    pub prices: Option<MarketPrices>,
}

// ============================================================================
// Scoring and Decision
// ============================================================================

/// Independent scoring factors, in evaluation and reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    NameMatch,
    NumberMatch,
    SetMatch,
    VariantMatch,
    RarityMatch,
    HpMatch,
    TypeMatch,
}

impl ScoreFactor {
    pub const ALL: [ScoreFactor; 7] = [
        Self::NameMatch,
        Self::NumberMatch,
        Self::SetMatch,
        Self::VariantMatch,
        Self::RarityMatch,
        Self::HpMatch,
        Self::TypeMatch,
    ];
}

/// What a factor matched, independent of the points configured for it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    #[default]
    None,
    /// Same series, different member (sets only)
    Family,
    Partial,
    Exact,
}

/// Points one factor contributed to a candidate's total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: ScoreFactor,
    pub points: i32,
    #[serde(default)]
    pub kind: MatchKind,
}

/// Confidence label for a candidate's total score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

/// Per-factor scoring detail for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub contributions: Vec<FactorScore>,
    pub total: i32,
    pub confidence_tier: ConfidenceTier,
    /// Human-readable reason for every nonzero factor, in factor order
    pub reasoning: Vec<String>,
}

impl ScoreBreakdown {
    pub fn points(&self, factor: ScoreFactor) -> i32 {
        self.contributions
            .iter()
            .find(|c| c.factor == factor)
            .map(|c| c.points)
            .unwrap_or(0)
    }

    pub fn kind(&self, factor: ScoreFactor) -> MatchKind {
        self.contributions
            .iter()
            .find(|c| c.factor == factor)
            .map(|c| c.kind)
            .unwrap_or_default()
    }
}

/// A candidate with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub candidate: CandidateCard,
    pub breakdown: ScoreBreakdown,
}

/// Final decision for a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchDecision {
    Found {
        candidate: CandidateCard,
        breakdown: ScoreBreakdown,
    },
    NotFound {
        best_breakdown: Option<ScoreBreakdown>,
        required_score: i32,
        /// required_score minus the best total, always >= 1
        gap: i32,
    },
}

impl MatchDecision {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

// ============================================================================
// Scan Result
// ============================================================================

/// Wall-clock time spent per stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub quality_ms: u64,
    /// Sum over every vision attempt, including retries
    pub vision_ms: u64,
    pub search_ms: u64,
    pub scoring_ms: u64,
    pub total_ms: u64,
}

/// How the scan's latency compared with the tier's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceRating {
    Excellent,
    Good,
    Acceptable,
    Slow,
}

impl PerformanceRating {
    pub fn from_latency(actual_ms: u64, target_ms: u64) -> Self {
        if target_ms == 0 {
            return Self::Slow;
        }
        let ratio = actual_ms as f64 / target_ms as f64;
        if ratio <= 0.8 {
            Self::Excellent
        } else if ratio <= 1.0 {
            Self::Good
        } else if ratio <= 1.5 {
            Self::Acceptable
        } else {
            Self::Slow
        }
    }
}

/// Estimated vision model cost of a scan (USD)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCost {
    pub input_usd: f64,
    pub output_usd: f64,
    pub image_usd: f64,
    pub total_usd: f64,
}

impl UsageCost {
    pub fn estimate(usage: TokenUsage, images_sent: u32, rates: &CostConfig) -> Self {
        let input_usd = f64::from(usage.prompt) / 1000.0 * rates.input_per_1k_tokens;
        let output_usd = f64::from(usage.response) / 1000.0 * rates.output_per_1k_tokens;
        let image_usd = f64::from(images_sent) * rates.per_image;
        Self {
            input_usd,
            output_usd,
            image_usd,
            total_usd: input_usd + output_usd + image_usd,
        }
    }
}

/// Everything a scan produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub quality: QualityReport,
    /// Tier of the vision attempt that produced `identification`
    pub tier_used: ProcessingTier,
    /// Full profile of that tier, including the latency target the scan was
    /// measured against
    pub tier_profile: TierProfile,
    pub identification: IdentificationRecord,
    pub decision: MatchDecision,
    /// Other candidates at or above the required score, best first
    pub alternatives: Vec<RankedMatch>,
    /// Retries, downgrades, skipped stages and fallback levels, in order
    pub diagnostics: Vec<String>,
    pub timings: StageTimings,
    pub performance: PerformanceRating,
    pub cost: UsageCost,
}

// Scan Pipeline
//
// Coordinates quality → tier → vision → parse → search → match for one photo.
//
// Workflow Phases:
// 1. Quality assessment (pure)
// 2. Tier selection (pure)
// 3. Vision identification, with retry / downgrade / upgrade policy
// 4. Candidate search (fallback ladder)
// 5. Scoring and decision
//
// Policy:
// - Vision service errors are retried while the shared retry budget lasts.
//   Once the soft time budget is spent the retry drops to a cheaper tier.
// - A reply the parser cannot use (confidence 0) is retried one tier up,
//   whatever the time spent; at the richest tier the empty record goes on.
// - Over budget before search: the set-family fan-out is skipped.
// - Every external call races the cancellation token.
// Each of these decisions is recorded in `ScanResult::diagnostics`.

use crate::catalog::{CardSearchClient, SearchCoordinator};
use crate::config::ScanConfig;
use crate::error::{Result, ScanError, VisionError};
use crate::imaging;
use crate::matching::MatchScorer;
use crate::parser::ResponseParser;
use crate::quality::QualityAssessor;
use crate::tier::TierSelector;
use crate::types::{
    IdentificationRecord, MatchDecision, PerformanceRating, ScanOptions, ScanResult, StageTimings,
    TierProfile, TokenUsage, UsageCost,
};
use crate::vision::{VisionClient, VisionResponse};
use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn scaled(target_ms: u64, factor: f64) -> Duration {
    Duration::from_millis((target_ms as f64 * factor).round() as u64)
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }
    Ok(())
}

/// Vision stage output
struct VisionStage {
    identification: IdentificationRecord,
    profile: TierProfile,
    usage: TokenUsage,
    images_sent: u32,
}

/// Card identification pipeline
///
/// Holds only immutable configuration and client handles; one instance can
/// serve concurrent scans.
pub struct ScanPipeline {
    config: Arc<ScanConfig>,
    assessor: QualityAssessor,
    selector: TierSelector,
    parser: ResponseParser,
    vision: Arc<dyn VisionClient>,
    search: SearchCoordinator,
    scorer: MatchScorer,
}

impl ScanPipeline {
    /// Build a pipeline; fails on invalid configuration
    pub fn new(
        config: ScanConfig,
        vision: Arc<dyn VisionClient>,
        search: Arc<dyn CardSearchClient>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            assessor: QualityAssessor::new(config.quality.clone()),
            selector: TierSelector::new(config.selection.clone(), config.tiers.clone()),
            parser: ResponseParser::default(),
            search: SearchCoordinator::new(search, config.search.clone()),
            scorer: MatchScorer::new(config.matching.clone()),
            vision,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Identify the card in a decoded photo
    pub async fn scan(
        &self,
        image: &RgbImage,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<ScanResult> {
        let scan_id = Uuid::new_v4();
        let span = tracing::info_span!("scan", %scan_id);
        self.run(scan_id, image, options, cancel).instrument(span).await
    }

    async fn run(
        &self,
        scan_id: Uuid,
        image: &RgbImage,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<ScanResult> {
        let started = Instant::now();
        let scanned_at = chrono::Utc::now();
        let mut timings = StageTimings::default();
        let mut diagnostics: Vec<String> = Vec::new();

        ensure_active(cancel)?;

        // Phase 1: Quality assessment
        let phase = Instant::now();
        let quality = self.assessor.assess(image)?;
        timings.quality_ms = elapsed_ms(phase);

        // Phase 2: Tier selection
        let selection = self.selector.select(quality.score, options);
        let soft_budget = options
            .time_budget_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| {
                scaled(
                    selection.profile.target_latency_ms,
                    self.config.pipeline.soft_budget_factor,
                )
            });
        diagnostics.push(format!(
            "{} tier selected ({})",
            selection.profile.tier,
            selection.reason.describe()
        ));
        tracing::info!(
            quality = quality.score,
            tier = %selection.profile.tier,
            budget_ms = soft_budget.as_millis() as u64,
            "Scan started"
        );

        ensure_active(cancel)?;

        // Phase 3: Vision identification
        let phase = Instant::now();
        let vision = self
            .identify(image, selection.profile, started, soft_budget, cancel, &mut diagnostics)
            .await;
        timings.vision_ms = elapsed_ms(phase);
        let VisionStage {
            mut identification,
            profile,
            usage,
            images_sent,
        } = vision?;
        identification.token_usage = usage;

        ensure_active(cancel)?;

        // Phase 4: Candidate search
        let phase = Instant::now();
        let over_budget = started.elapsed() > soft_budget;
        let query_timeout = scaled(profile.target_latency_ms, self.config.search.query_timeout_factor);
        let outcome = self
            .search
            .search(&identification, query_timeout, over_budget, cancel)
            .await?;
        timings.search_ms = elapsed_ms(phase);
        diagnostics.extend(outcome.diagnostics);

        // Phase 5: Scoring and decision
        let phase = Instant::now();
        let (decision, alternatives) = self.scorer.decide(&identification, &outcome.candidates);
        timings.scoring_ms = elapsed_ms(phase);
        if let MatchDecision::NotFound {
            required_score,
            gap,
            best_breakdown,
        } = &decision
        {
            match best_breakdown {
                Some(best) => diagnostics.push(format!(
                    "best candidate scored {} of required {} (gap {})",
                    best.total, required_score, gap
                )),
                None => diagnostics.push("no candidates to score".to_string()),
            }
        }

        timings.total_ms = elapsed_ms(started);
        let performance = PerformanceRating::from_latency(timings.total_ms, profile.target_latency_ms);
        let cost = UsageCost::estimate(usage, images_sent, &self.config.cost);

        tracing::info!(
            found = decision.is_found(),
            tier = %profile.tier,
            total_ms = timings.total_ms,
            performance = ?performance,
            cost_usd = cost.total_usd,
            "Scan completed"
        );

        Ok(ScanResult {
            scan_id,
            scanned_at,
            quality,
            tier_used: profile.tier,
            tier_profile: profile,
            identification,
            decision,
            alternatives,
            diagnostics,
            timings,
            performance,
            cost,
        })
    }

    /// One vision call under timeout and cancellation
    ///
    /// The outer error is cancellation only.
    async fn call_vision(
        &self,
        jpeg: &[u8],
        profile: &TierProfile,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<VisionResponse, VisionError>> {
        let timeout = scaled(profile.target_latency_ms, self.config.pipeline.call_timeout_factor);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            result = tokio::time::timeout(timeout, self.vision.identify(jpeg, profile)) => {
                Ok(result.unwrap_or(Err(VisionError::Timeout)))
            }
        }
    }

    /// Vision attempts until a usable record, an exhausted budget, or an error
    async fn identify(
        &self,
        image: &RgbImage,
        initial: TierProfile,
        started: Instant,
        soft_budget: Duration,
        cancel: &CancellationToken,
        diagnostics: &mut Vec<String>,
    ) -> Result<VisionStage> {
        let mut profile = initial;
        let mut retries_left = self.config.pipeline.retry_budget;
        let mut usage = TokenUsage::default();
        let mut images_sent = 0u32;

        loop {
            let jpeg = imaging::prepare_for_tier(image, &profile)?;
            images_sent += 1;

            match self.call_vision(&jpeg, &profile, cancel).await? {
                Ok(response) => {
                    usage.add(response.token_usage);
                    if response.truncated {
                        diagnostics.push(format!("{} tier reply truncated at token limit", profile.tier));
                    }
                    let record = self.parser.parse(&response.raw_text, response.token_usage);
                    if record.confidence > 0.0 {
                        return Ok(VisionStage {
                            identification: record,
                            profile,
                            usage,
                            images_sent,
                        });
                    }

                    match profile.tier.richer() {
                        Some(next) if retries_left > 0 => {
                            retries_left -= 1;
                            diagnostics.push(format!(
                                "no usable identification from {} tier; retrying at {} tier",
                                profile.tier, next
                            ));
                            tracing::warn!(from = %profile.tier, to = %next, "Unparseable vision reply, upgrading tier");
                            profile = self.config.tiers.profile(next);
                        }
                        _ => {
                            diagnostics.push(format!(
                                "no usable identification from {} tier; continuing with empty record",
                                profile.tier
                            ));
                            tracing::warn!(tier = %profile.tier, "Unparseable vision reply, no retry left");
                            return Ok(VisionStage {
                                identification: record,
                                profile,
                                usage,
                                images_sent,
                            });
                        }
                    }
                }
                Err(err) => {
                    if retries_left == 0 {
                        diagnostics.push(format!("vision call failed at {} tier: {}", profile.tier, err));
                        tracing::error!(tier = %profile.tier, error = %err, "Vision service failed, retry budget spent");
                        return Err(ScanError::VisionService(err));
                    }
                    retries_left -= 1;

                    let over_budget = started.elapsed() > soft_budget;
                    match profile.tier.cheaper() {
                        Some(cheaper) if over_budget => {
                            diagnostics.push(format!(
                                "vision call failed at {} tier ({}); budget exceeded, retrying at {} tier",
                                profile.tier, err, cheaper
                            ));
                            tracing::warn!(from = %profile.tier, to = %cheaper, error = %err, "Vision retry downgraded");
                            profile = self.config.tiers.profile(cheaper);
                        }
                        _ => {
                            diagnostics.push(format!(
                                "vision call failed at {} tier ({}); retrying",
                                profile.tier, err
                            ));
                            tracing::warn!(tier = %profile.tier, error = %err, "Vision retry");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CardQuery;
    use crate::error::SearchError;
    use crate::types::CandidateCard;
    use async_trait::async_trait;

    struct NoVision;

    #[async_trait]
    impl VisionClient for NoVision {
        async fn identify(&self, _: &[u8], _: &TierProfile) -> std::result::Result<VisionResponse, VisionError> {
            Err(VisionError::Unavailable("offline".into()))
        }
    }

    struct NoSearch;

    #[async_trait]
    impl CardSearchClient for NoSearch {
        async fn search(&self, _: &CardQuery) -> std::result::Result<Vec<CandidateCard>, SearchError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScanConfig::default();
        config.matching.required_score = 0;
        let result = ScanPipeline::new(config, Arc::new(NoVision), Arc::new(NoSearch));
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn test_scaled_timeout() {
        assert_eq!(scaled(1000, 4.0), Duration::from_millis(4000));
        assert_eq!(scaled(2000, 2.0), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let pipeline = ScanPipeline::new(ScanConfig::default(), Arc::new(NoVision), Arc::new(NoSearch)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let image = RgbImage::new(400, 400);
        let result = pipeline.scan(&image, &ScanOptions::default(), &cancel).await;
        assert!(matches!(result, Err(ScanError::Cancelled)));
    }

    #[tokio::test]
    async fn test_zero_sized_image_rejected() {
        let pipeline = ScanPipeline::new(ScanConfig::default(), Arc::new(NoVision), Arc::new(NoSearch)).unwrap();
        let image = RgbImage::new(0, 0);
        let result = pipeline
            .scan(&image, &ScanOptions::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScanError::InvalidImage(_))));
    }
}

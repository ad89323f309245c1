// Quality Assessor
//
// Scores a decoded photo before any remote call is made. The score drives
// tier selection; issues and suggestions are returned to the user as-is.
//
// Composite = round(blur * w_blur + resolution * w_res + exposure * w_exp)
// Glare is detected and reported but does not change the score.

pub mod metrics;

use crate::config::QualityConfig;
use crate::error::{Result, ScanError};
use crate::types::{QualityMetrics, QualityRating, QualityReport};
use image::RgbImage;

/// Image quality assessor
///
/// Deterministic: the same pixels always give the same report.
pub struct QualityAssessor {
    config: QualityConfig,
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

impl QualityAssessor {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Assess a decoded RGB image
    ///
    /// # Errors
    /// `ScanError::InvalidImage` for a zero-sized image.
    pub fn assess(&self, image: &RgbImage) -> Result<QualityReport> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ScanError::InvalidImage("image has zero size".into()));
        }

        let cfg = &self.config;
        let blur = metrics::blur_score(metrics::laplacian_variance(image));
        let resolution = metrics::resolution_score(
            width,
            height,
            cfg.min_dimension,
            cfg.comfortable_dimension,
        );
        let (under, over, mid) = metrics::exposure_fractions(image, cfg.dark_level, cfg.bright_level);
        let exposure = metrics::exposure_score(under, over, mid);
        let glare_fraction = metrics::glare_fraction(image, cfg.glare_luma);

        let composite = blur * cfg.blur_weight
            + resolution * cfg.resolution_weight
            + exposure * cfg.exposure_weight;
        let score = composite.round().clamp(0.0, 100.0) as u8;

        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        if blur < cfg.blur_issue_below {
            issues.push("Image appears blurry".to_string());
            suggestions.push("Hold the camera steady and make sure the card is in focus".to_string());
        }
        if resolution < cfg.resolution_issue_below {
            issues.push("Image resolution is too low".to_string());
            suggestions.push("Move closer to the card or use a higher camera resolution".to_string());
        }
        if exposure < cfg.exposure_issue_below {
            if under > over {
                issues.push("Image is too dark".to_string());
            } else {
                issues.push("Image is overexposed".to_string());
            }
            suggestions.push("Improve the lighting and avoid harsh shadows".to_string());
        }
        if glare_fraction > cfg.glare_fraction {
            issues.push("Glare detected on the card surface".to_string());
            suggestions.push("Tilt the card slightly to move reflections off foil areas".to_string());
        }

        if issues.is_empty() {
            if score > 80 {
                suggestions.push("Excellent image quality".to_string());
            } else if score > 60 {
                suggestions.push("Good image quality".to_string());
            }
        }

        tracing::debug!(
            score,
            blur,
            resolution,
            exposure,
            glare_fraction,
            "Image quality assessed"
        );

        Ok(QualityReport {
            score,
            rating: QualityRating::from_score(score),
            issues,
            suggestions,
            metrics: QualityMetrics {
                blur,
                resolution,
                exposure,
                glare_fraction,
            },
        })
    }
}

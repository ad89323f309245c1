// Vision Identification Client
//
// Boundary to the external vision-language model. The pipeline only needs
// raw text plus token usage back; prompt wording, transport and model quirks
// stay behind the trait.

pub mod gemini;
pub mod prompts;

use crate::error::VisionError;
use crate::types::{TierProfile, TokenUsage};
use async_trait::async_trait;

pub use gemini::GeminiClient;

/// Raw model reply for one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionResponse {
    pub raw_text: String,
    pub token_usage: TokenUsage,
    /// Output was cut off by the token limit
    pub truncated: bool,
}

/// A vision model that can describe a card photo
///
/// Implementations must not retry internally; retry policy belongs to the
/// pipeline.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Identify the card in a JPEG image using the tier's model and limits
    async fn identify(
        &self,
        image_jpeg: &[u8],
        tier: &TierProfile,
    ) -> Result<VisionResponse, VisionError>;
}

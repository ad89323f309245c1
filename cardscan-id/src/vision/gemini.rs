// Gemini Vision Client
//
// Calls the Gemini `generateContent` REST endpoint with the tier prompt and
// the JPEG inline (base64). One request per call; no internal retries.
//
// Error mapping:
// - HTTP 429                 -> QuotaExceeded
// - request/response timeout -> Timeout
// - anything else            -> Unavailable
//
// finishReason == MAX_TOKENS marks the reply as truncated.

use super::prompts;
use super::{VisionClient, VisionResponse};
use crate::error::VisionError;
use crate::types::{ProcessingTier, TierProfile, TokenUsage};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public Gemini API root
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Create a client
    ///
    /// `base_url` defaults to the public API. The HTTP client carries a
    /// generous overall timeout; the pipeline applies the per-tier deadline.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        user_agent: &str,
    ) -> cardscan_common::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| cardscan_common::Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

fn sampling_top_p(tier: ProcessingTier) -> f32 {
    match tier {
        ProcessingTier::Fast => 0.8,
        ProcessingTier::Standard => 0.9,
        ProcessingTier::Enhanced => 0.95,
    }
}

fn build_request(image_jpeg: &[u8], tier: &TierProfile) -> GenerateRequest {
    let data = base64::engine::general_purpose::STANDARD.encode(image_jpeg);
    GenerateRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::Text {
                    text: prompts::prompt_for(tier.tier),
                },
                RequestPart::Image {
                    inline_data: InlineData {
                        mime_type: "image/jpeg",
                        data,
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: 0.1,
            top_p: sampling_top_p(tier.tier),
            max_output_tokens: tier.max_output_tokens,
        },
    }
}

fn into_vision_response(response: GenerateResponse) -> VisionResponse {
    let token_usage = response
        .usage_metadata
        .map(|u| TokenUsage {
            prompt: u.prompt_token_count,
            response: u.candidates_token_count,
        })
        .unwrap_or_default();

    let Some(first) = response.candidates.into_iter().next() else {
        return VisionResponse {
            token_usage,
            ..Default::default()
        };
    };

    let truncated = first.finish_reason.as_deref() == Some("MAX_TOKENS");
    let raw_text = first
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    VisionResponse {
        raw_text,
        token_usage,
        truncated,
    }
}

fn transport_error(err: reqwest::Error) -> VisionError {
    if err.is_timeout() {
        VisionError::Timeout
    } else {
        VisionError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl VisionClient for GeminiClient {
    async fn identify(
        &self,
        image_jpeg: &[u8],
        tier: &TierProfile,
    ) -> Result<VisionResponse, VisionError> {
        let url = self.endpoint(&tier.model_variant);
        let body = build_request(image_jpeg, tier);

        tracing::debug!(
            model = %tier.model_variant,
            tier = %tier.tier,
            image_bytes = image_jpeg.len(),
            "Calling Gemini generateContent"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Gemini quota exceeded");
            return Err(VisionError::QuotaExceeded);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(200).collect();
            return Err(VisionError::Unavailable(format!("HTTP {}: {}", status, detail)));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                VisionError::Timeout
            } else {
                VisionError::Unavailable(format!("malformed Gemini response: {}", e))
            }
        })?;

        let result = into_vision_response(parsed);
        tracing::info!(
            tier = %tier.tier,
            prompt_tokens = result.token_usage.prompt,
            response_tokens = result.token_usage.response,
            truncated = result.truncated,
            "Gemini call completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierTable;

    #[test]
    fn test_request_shape() {
        let profile = TierTable::default().profile(ProcessingTier::Standard);
        let request = build_request(&[0xFF, 0xD8, 0xFF], &profile);
        let json = serde_json::to_value(&request).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("TCG_SEARCH_START"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "/9j/");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2000);
        assert!(json["generationConfig"]["topP"].as_f64().unwrap() > 0.85);
    }

    #[test]
    fn test_response_text_and_usage() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "TCG_SEARCH_START\n"}, {"text": "{\"name\": \"Pikachu\"}\nTCG_SEARCH_END"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 1290, "candidatesTokenCount": 42, "totalTokenCount": 1332}
        });
        let parsed: GenerateResponse = serde_json::from_value(body).unwrap();
        let response = into_vision_response(parsed);

        assert!(response.raw_text.starts_with("TCG_SEARCH_START"));
        assert!(response.raw_text.contains("Pikachu"));
        assert_eq!(response.token_usage, TokenUsage { prompt: 1290, response: 42 });
        assert!(!response.truncated);
    }

    #[test]
    fn test_max_tokens_marks_truncation() {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "{\"name\": \"Pika"}]}, "finishReason": "MAX_TOKENS"}]
        });
        let parsed: GenerateResponse = serde_json::from_value(body).unwrap();
        let response = into_vision_response(parsed);
        assert!(response.truncated);
        assert_eq!(response.token_usage, TokenUsage::default());
    }

    #[test]
    fn test_no_candidates_gives_empty_text() {
        let parsed: GenerateResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        let response = into_vision_response(parsed);
        assert!(response.raw_text.is_empty());
    }

    #[test]
    fn test_endpoint_uses_model_variant() {
        let client = GeminiClient::new(
            "key".into(),
            Some("http://localhost:8080/v1beta/".into()),
            "cardscan/test",
        )
        .unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}

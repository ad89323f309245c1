// Response Parser
//
// Turns unstructured vision model output into an IdentificationRecord.
//
// 1. Run extraction strategies in order; first success wins
// 2. Strip hedging language (each hedged field costs 20% confidence)
// 3. Normalize: names, collector number, set aliases, HP, types, rarity
// 4. Detect print language and fill in an English name when possible
//
// Never fails: output the parser cannot use becomes an empty record with
// confidence 0, which the pipeline treats as a retry signal.

pub mod language;
pub mod normalize;
pub mod strategies;

use crate::types::{IdentificationRecord, TokenUsage};
use normalize::{is_vague, strip_vague};
use strategies::{default_strategies, ExtractionStrategy, ParsedFields};

/// Confidence multiplier per field that carried hedging language
const VAGUE_PENALTY: f32 = 0.8;

/// Vision response parser
pub struct ResponseParser {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::with_strategies(default_strategies())
    }
}

fn dehedge(label: &str, value: Option<String>, vague_fields: &mut Vec<String>) -> Option<String> {
    let value = value?;
    if is_vague(&value) {
        vague_fields.push(label.to_string());
        let stripped = strip_vague(&value);
        (!stripped.is_empty()).then_some(stripped)
    } else {
        Some(value)
    }
}

impl ResponseParser {
    /// Parser with a custom strategy cascade, tried in the given order
    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Parse raw model text
    pub fn parse(&self, raw_text: &str, token_usage: TokenUsage) -> IdentificationRecord {
        for strategy in &self.strategies {
            let Some(fields) = strategy.extract(raw_text) else {
                continue;
            };
            let mut record = self.build_record(fields, strategy.base_confidence());
            if record.is_empty() {
                tracing::debug!(strategy = ?strategy.kind(), "Fields extracted but none usable after cleanup");
                continue;
            }
            record.strategy = Some(strategy.kind());
            record.raw_text = raw_text.to_string();
            record.token_usage = token_usage;
            tracing::debug!(
                strategy = ?strategy.kind(),
                confidence = record.confidence,
                name = ?record.name,
                "Vision response parsed"
            );
            return record;
        }

        tracing::debug!(chars = raw_text.len(), "No extraction strategy matched vision response");
        IdentificationRecord {
            confidence: 0.0,
            detected_language: "en".to_string(),
            raw_text: raw_text.to_string(),
            token_usage,
            ..Default::default()
        }
    }

    fn build_record(&self, fields: ParsedFields, base_confidence: f32) -> IdentificationRecord {
        let mut vague_fields = Vec::new();
        let name = dehedge("name", fields.name, &mut vague_fields);
        let original = dehedge("original_name", fields.original_name, &mut vague_fields);
        let set_raw = dehedge("set_name", fields.set_name, &mut vague_fields);
        let number_raw = dehedge("number", fields.number, &mut vague_fields);

        let number = number_raw.as_deref().and_then(normalize::parse_card_number);
        let set_name = set_raw
            .as_deref()
            .and_then(|s| normalize::canonical_set_name(s, number.as_ref().map(|n| n.number.as_str())));
        let set_name = normalize::reconcile_set(set_name, number.as_ref().and_then(|n| n.set_total));

        let english = name.as_deref().and_then(normalize::clean_name);
        let printed = original
            .as_deref()
            .and_then(normalize::clean_name)
            .filter(|p| english.as_ref() != Some(p));

        let detected_language = language::detect_language(
            fields.language.as_deref(),
            printed.as_deref().or(english.as_deref()),
        );

        let (name, translated_name) = if detected_language == "en" {
            (english.or(printed), None)
        } else if printed.is_some() {
            (printed, english)
        } else {
            (english, None)
        };
        let translated_name = translated_name.or_else(|| {
            if detected_language == "en" {
                None
            } else {
                name.as_deref().and_then(language::translate)
            }
        });

        let confidence = base_confidence * VAGUE_PENALTY.powi(vague_fields.len() as i32);

        IdentificationRecord {
            name,
            set_name,
            set_total: number.as_ref().and_then(|n| n.set_total),
            number: number.map(|n| n.number),
            hp: fields.hp.as_deref().and_then(normalize::normalize_hp),
            rarity: fields.rarity.as_deref().and_then(normalize::normalize_rarity),
            types: normalize::normalize_types(&fields.types),
            confidence: confidence.clamp(0.0, 1.0),
            detected_language,
            translated_name,
            vague_fields,
            ..Default::default()
        }
    }
}

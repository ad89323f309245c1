//! Per-tier prompts
//!
//! Every prompt asks for one JSON object between the `TCG_SEARCH_START` and
//! `TCG_SEARCH_END` markers. The fast prompt stays short to keep output
//! tokens low; the enhanced prompt walks the model through the card.

use crate::types::ProcessingTier;

/// Marker opening the structured block in model output
pub const BLOCK_START: &str = "TCG_SEARCH_START";
/// Marker closing the structured block in model output
pub const BLOCK_END: &str = "TCG_SEARCH_END";

const FIELDS: &str = r#"{"name": "English card name", "original_name": "name as printed if not English, else omit", "language": "en|ja|fr|de|es|it|pt|ko|zh", "set_name": "expansion name", "number": "collector number as printed, e.g. 4/102", "hp": "HP value", "types": ["energy types"], "rarity": "rarity"}"#;

pub fn prompt_for(tier: ProcessingTier) -> String {
    match tier {
        ProcessingTier::Fast => format!(
            "Identify this Pokemon trading card. Reply with only:\n{}\n{}\n{}\n\
             Omit fields you cannot read.",
            BLOCK_START, FIELDS, BLOCK_END
        ),
        ProcessingTier::Standard => format!(
            "You are identifying a Pokemon trading card from a photo.\n\
             Read the card name, the set (from the set symbol or footer text), the collector \
             number in the bottom corner, the HP and the energy types.\n\
             If the card is not in English, give the English name in \"name\" and the printed \
             name in \"original_name\".\n\
             Reply with this block and nothing else:\n{}\n{}\n{}\n\
             Omit fields you cannot read. Do not guess.",
            BLOCK_START, FIELDS, BLOCK_END
        ),
        ProcessingTier::Enhanced => format!(
            "You are an expert Pokemon trading card grader identifying a card from a photo \
             that may be blurry, dark, angled or behind a sleeve.\n\
             Work through the card in this order:\n\
             1. Card name at the top, including suffixes such as V, VMAX, VSTAR, GX, EX or ex \
             and any partner names joined with '&'.\n\
             2. HP at the top right and the energy type symbol.\n\
             3. Collector number and set size at the bottom (e.g. 4/102, SV65/SV94, TG05/TG30).\n\
             4. Set name from the set symbol, footer text or copyright line.\n\
             5. Rarity symbol (circle, diamond, star) or printed rarity.\n\
             6. Print language. If not English, give the English name in \"name\" and the \
             printed name in \"original_name\".\n\
             After your reasoning, finish with exactly one block:\n{}\n{}\n{}\n\
             Omit any field you cannot read with confidence.",
            BLOCK_START, FIELDS, BLOCK_END
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_prompt_requests_block() {
        for tier in ProcessingTier::ALL {
            let prompt = prompt_for(tier);
            assert!(prompt.contains(BLOCK_START));
            assert!(prompt.contains(BLOCK_END));
            assert!(prompt.contains("\"number\""));
        }
    }

    #[test]
    fn test_fast_prompt_is_shortest() {
        let fast = prompt_for(ProcessingTier::Fast).len();
        assert!(fast < prompt_for(ProcessingTier::Standard).len());
        assert!(fast < prompt_for(ProcessingTier::Enhanced).len());
    }
}

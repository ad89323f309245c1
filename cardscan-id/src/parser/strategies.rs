// Extraction Strategies
//
// Each strategy is a pure function from model text to raw fields. The parser
// tries them in order and stops at the first one that yields a name, set
// or number.
//
// | Strategy        | Accepts                                         | Confidence |
// |-----------------|-------------------------------------------------|------------|
// | StrictJson      | the whole reply is one JSON object              | 0.95       |
// | DelimitedBlock  | marker block, ```json fence, or largest {...}   | 0.85       |
// | LenientKeyValue | "Label: value" lines                            | 0.50       |

use super::normalize::is_placeholder;
use crate::types::ParseStrategy;
use crate::vision::prompts::{BLOCK_END, BLOCK_START};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static MARKER_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s){}\s*(.*?)\s*{}",
        regex::escape(BLOCK_START),
        regex::escape(BLOCK_END)
    ))
    .expect("static regex")
});

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("static regex"));

static LIST_NUMBERING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)]\s+").expect("static regex"));

/// Raw, uncleaned fields pulled out of model text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFields {
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub set_name: Option<String>,
    pub number: Option<String>,
    pub hp: Option<String>,
    pub rarity: Option<String>,
    pub types: Vec<String>,
    pub language: Option<String>,
}

impl ParsedFields {
    /// At least one identifying field with real content
    pub fn has_identity(&self) -> bool {
        [&self.name, &self.set_name, &self.number]
            .iter()
            .any(|f| f.as_deref().is_some_and(|v| !is_placeholder(v)))
    }

    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::OriginalName => &mut self.original_name,
            Field::Set => &mut self.set_name,
            Field::Number => &mut self.number,
            Field::Hp => &mut self.hp,
            Field::Rarity => &mut self.rarity,
            Field::Language => &mut self.language,
            Field::Types => {
                if self.types.is_empty() {
                    self.types.push(value);
                }
                return;
            }
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// Fields from a JSON object (or an object nested under "card")
    fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let object = match object.get("card").and_then(Value::as_object) {
            Some(inner) => inner,
            None => object,
        };

        let mut fields = ParsedFields::default();
        for (key, value) in object {
            let Some(field) = Field::from_label(key) else {
                continue;
            };
            if field == Field::Types {
                fields.types = json_strings(value);
            } else if let Some(text) = json_scalar(value) {
                fields.set(field, text);
            }
        }
        Some(fields)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    OriginalName,
    Set,
    Number,
    Hp,
    Rarity,
    Types,
    Language,
}

impl Field {
    fn from_label(label: &str) -> Option<Self> {
        let key = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'')
            .trim()
            .to_lowercase()
            .replace('_', " ")
            .replace("(s)", "s");
        let field = match key.as_str() {
            "name" | "card name" | "pokemon" | "pokémon" | "pokemon name" | "pokémon name"
            | "card" | "english name" => Self::Name,
            "original name" | "printed name" | "japanese name" | "local name" => Self::OriginalName,
            "set" | "set name" | "expansion" | "expansion name" | "series set" => Self::Set,
            "number" | "card number" | "collector number" | "set number" | "no" | "no."
            | "#" | "card no" | "card no." => Self::Number,
            "hp" | "hit points" => Self::Hp,
            "rarity" => Self::Rarity,
            "type" | "types" | "energy type" | "energy types" | "element" => Self::Types,
            "language" | "lang" => Self::Language,
            _ => return None,
        };
        Some(field)
    }
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(json_scalar).collect(),
        other => json_scalar(other).into_iter().collect(),
    }
}

/// Parse text as a JSON object and pull fields out of it
fn fields_from_json_text(text: &str) -> Option<ParsedFields> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    if !value.is_object() {
        return None;
    }
    ParsedFields::from_json(&value).filter(ParsedFields::has_identity)
}

/// Top-level balanced `{...}` spans, longest first
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    spans.sort_by_key(|s| std::cmp::Reverse(s.len()));
    spans
}

fn fields_from_embedded_json(text: &str) -> Option<ParsedFields> {
    if let Some(fields) = fields_from_json_text(text) {
        return Some(fields);
    }
    for caps in FENCED_BLOCK.captures_iter(text) {
        if let Some(fields) = caps.get(1).and_then(|m| fields_from_json_text(m.as_str())) {
            return Some(fields);
        }
    }
    balanced_objects(text)
        .into_iter()
        .find_map(fields_from_json_text)
}

/// One way of pulling fields out of model text
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> ParseStrategy;

    /// Confidence assigned when this strategy succeeds
    fn base_confidence(&self) -> f32;

    /// `None` when the strategy does not apply to this text
    fn extract(&self, text: &str) -> Option<ParsedFields>;
}

/// The whole reply is a single JSON object
pub struct StrictJson;

impl ExtractionStrategy for StrictJson {
    fn kind(&self) -> ParseStrategy {
        ParseStrategy::StrictJson
    }

    fn base_confidence(&self) -> f32 {
        0.95
    }

    fn extract(&self, text: &str) -> Option<ParsedFields> {
        fields_from_json_text(text)
    }
}

/// JSON embedded in prose: marker block, then fenced block, then largest object
pub struct DelimitedBlock;

impl ExtractionStrategy for DelimitedBlock {
    fn kind(&self) -> ParseStrategy {
        ParseStrategy::DelimitedBlock
    }

    fn base_confidence(&self) -> f32 {
        0.85
    }

    fn extract(&self, text: &str) -> Option<ParsedFields> {
        if let Some(inner) = MARKER_BLOCK.captures(text).and_then(|c| c.get(1)) {
            if let Some(fields) = fields_from_embedded_json(inner.as_str()) {
                return Some(fields);
            }
        }
        fields_from_embedded_json(text)
    }
}

/// `Label: value` lines, tolerant of bullets, numbering and bold markers
pub struct LenientKeyValue;

impl LenientKeyValue {
    fn split_line(line: &str) -> Option<(&str, &str)> {
        for sep in [":", "：", " - ", " – ", "="] {
            if let Some((label, value)) = line.split_once(sep) {
                return Some((label, value));
            }
        }
        None
    }
}

impl ExtractionStrategy for LenientKeyValue {
    fn kind(&self) -> ParseStrategy {
        ParseStrategy::LenientKeyValue
    }

    fn base_confidence(&self) -> f32 {
        0.5
    }

    fn extract(&self, text: &str) -> Option<ParsedFields> {
        let mut fields = ParsedFields::default();

        for raw_line in text.lines() {
            let line = raw_line.replace("**", "").replace("__", "");
            let line = line.trim().trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | '>' | ' '));
            let line = LIST_NUMBERING.replace(line, "");

            let Some((label, value)) = Self::split_line(&line) else {
                continue;
            };
            let Some(field) = Field::from_label(label) else {
                continue;
            };
            let value = value
                .trim()
                .trim_end_matches(',')
                .trim_matches(|c: char| c == '"' || c == '\'')
                .trim();
            if value.is_empty() {
                continue;
            }
            fields.set(field, value.to_string());
        }

        fields.has_identity().then_some(fields)
    }
}

/// Default cascade order
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(StrictJson),
        Box::new(DelimitedBlock),
        Box::new(LenientKeyValue),
    ]
}

//! Scoring factors
//!
//! Each factor is a pure function of the identification record, one
//! candidate and the match configuration. A factor that awards or deducts
//! points also says why.

use crate::catalog::set_families::{same_family, set_key};
use crate::config::MatchConfig;
use crate::parser::normalize::{normalize_hp, parse_card_number};
use crate::types::{CandidateCard, IdentificationRecord, MatchKind, ScoreFactor};

/// Points from one factor, what it matched, and the reason when nonzero
#[derive(Debug, Clone, PartialEq)]
pub struct FactorOutcome {
    pub points: i32,
    pub kind: MatchKind,
    pub reason: Option<String>,
}

impl FactorOutcome {
    fn none() -> Self {
        Self {
            points: 0,
            kind: MatchKind::None,
            reason: None,
        }
    }

    fn award(points: i32, reason: String) -> Self {
        if points == 0 {
            return Self::none();
        }
        Self {
            points,
            kind: MatchKind::None,
            reason: Some(reason),
        }
    }

    fn matched(self, kind: MatchKind) -> Self {
        Self { kind, ..self }
    }
}

/// Evaluate one factor
pub fn evaluate(
    factor: ScoreFactor,
    record: &IdentificationRecord,
    candidate: &CandidateCard,
    config: &MatchConfig,
) -> FactorOutcome {
    match factor {
        ScoreFactor::NameMatch => name_match(record, candidate, config),
        ScoreFactor::NumberMatch => number_match(record, candidate, config),
        ScoreFactor::SetMatch => set_match(record, candidate, config),
        ScoreFactor::VariantMatch => variant_match(record, candidate, config),
        ScoreFactor::RarityMatch => rarity_match(record, candidate, config),
        ScoreFactor::HpMatch => hp_match(record, candidate, config),
        ScoreFactor::TypeMatch => type_match(record, candidate, config),
    }
}

// ============================================================================
// Names
// ============================================================================

/// Trailing tokens that mark a print variant rather than a different Pokémon
const VARIANT_SUFFIXES: &[&str] = &[
    "v", "vmax", "vstar", "ex", "gx", "break", "prime", "lv.x", "lvx", "delta", "δ", "star", "☆",
    "plasma",
];

/// Leading tokens with the same role
const VARIANT_PREFIXES: &[&str] = &["dark", "light", "shining", "radiant", "crystal"];

/// Lowercase, unify apostrophes, collapse whitespace
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['’', '`'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Name with variant markers removed (`"charizard vmax"` -> `"charizard"`)
pub fn base_name(name: &str) -> String {
    let normalized = normalize_name(name);
    let mut tokens: Vec<&str> = Vec::new();
    for token in normalized.split(' ') {
        // Older prints hyphenate the marker ("mewtwo-ex")
        match token.rsplit_once('-') {
            Some((head, tail)) if !head.is_empty() && VARIANT_SUFFIXES.contains(&tail) => {
                tokens.push(head);
                tokens.push(tail);
            }
            _ => tokens.push(token),
        }
    }

    while tokens.len() > 1 && tokens.last().is_some_and(|t| VARIANT_SUFFIXES.contains(t)) {
        tokens.pop();
    }
    while tokens.len() > 1 && VARIANT_PREFIXES.contains(&tokens[0]) {
        tokens.remove(0);
    }
    tokens.join(" ")
}

fn name_match(record: &IdentificationRecord, candidate: &CandidateCard, config: &MatchConfig) -> FactorOutcome {
    let weights = &config.weights;
    let target = normalize_name(&candidate.name);
    let target_base = base_name(&candidate.name);

    let names = [record.name.as_deref(), record.translated_name.as_deref()];
    let mut best = FactorOutcome::none();
    for read in names.into_iter().flatten() {
        let outcome = if normalize_name(read) == target {
            FactorOutcome::award(weights.name_exact, format!("exact name match '{}'", candidate.name))
                .matched(MatchKind::Exact)
        } else if base_name(read) == target_base {
            FactorOutcome::award(
                weights.name_fuzzy,
                format!("same Pokémon '{}' ~ '{}'", read, candidate.name),
            )
            .matched(MatchKind::Partial)
        } else {
            let similarity = strsim::normalized_levenshtein(&normalize_name(read), &target);
            if similarity >= config.fuzzy_name_similarity {
                FactorOutcome::award(
                    weights.name_fuzzy,
                    format!("similar name '{}' ~ '{}' ({:.2})", read, candidate.name, similarity),
                )
                .matched(MatchKind::Partial)
            } else {
                FactorOutcome::none()
            }
        };
        if outcome.points > best.points {
            best = outcome;
        }
    }
    best
}

// ============================================================================
// Number and set
// ============================================================================

fn number_match(record: &IdentificationRecord, candidate: &CandidateCard, config: &MatchConfig) -> FactorOutcome {
    let weights = &config.weights;
    let (Some(read), Some(printed)) = (record.number.as_deref(), candidate.number.as_deref()) else {
        return FactorOutcome::none();
    };
    let printed_number = parse_card_number(printed)
        .map(|n| n.number)
        .unwrap_or_else(|| printed.to_string());
    let number_equal = read.eq_ignore_ascii_case(&printed_number);

    match (record.set_total, candidate.set_total) {
        (Some(read_total), Some(printed_total)) => {
            let total_equal = read_total == printed_total;
            match (number_equal, total_equal) {
                (true, true) => FactorOutcome::award(
                    weights.number_exact,
                    format!("card number {}/{} matches", read, read_total),
                )
                .matched(MatchKind::Exact),
                (true, false) => FactorOutcome::award(
                    weights.number_partial,
                    format!("card number {} matches but set size {} != {}", read, read_total, printed_total),
                )
                .matched(MatchKind::Partial),
                (false, true) => FactorOutcome::award(
                    weights.number_partial,
                    format!("set size {} matches but card number {} != {}", read_total, read, printed_number),
                )
                .matched(MatchKind::Partial),
                (false, false) => FactorOutcome::none(),
            }
        }
        _ if number_equal => {
            FactorOutcome::award(weights.number_exact, format!("card number {} matches", read))
                .matched(MatchKind::Exact)
        }
        _ => FactorOutcome::none(),
    }
}

fn set_match(record: &IdentificationRecord, candidate: &CandidateCard, config: &MatchConfig) -> FactorOutcome {
    let weights = &config.weights;
    let (Some(read), Some(printed)) = (record.set_name.as_deref(), candidate.set_name.as_deref()) else {
        return FactorOutcome::none();
    };
    if set_key(read) == set_key(printed) {
        FactorOutcome::award(weights.set_exact, format!("set '{}' matches", printed)).matched(MatchKind::Exact)
    } else if same_family(read, printed) {
        FactorOutcome::award(
            weights.set_family,
            format!("set '{}' is in the same series as '{}'", printed, read),
        )
        .matched(MatchKind::Family)
    } else {
        FactorOutcome::none()
    }
}

// ============================================================================
// Variant
// ============================================================================

/// Number of Pokémon on the card (`"Pikachu & Zekrom-GX"` -> 2)
fn team_size(name: &str) -> usize {
    let upper = name.to_uppercase();
    let partners = name.matches('&').count();
    if partners == 0 && upper.contains("TAG TEAM") {
        2
    } else {
        partners + 1
    }
}

/// `Ex` or `eX`: one of the ex mechanics, era unknown
const EX_EITHER_ERA: &str = "ex/EX";

/// Game mechanic printed in the name, if any
///
/// `EX` (2012 era) and `ex` (2003 and 2023 eras) are different mechanics.
/// Every other marker is matched case-insensitively.
fn mechanic(name: &str) -> Option<&'static str> {
    let tokens: Vec<&str> = name
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.first().is_some_and(|t| t.eq_ignore_ascii_case("radiant")) {
        return Some("Radiant");
    }
    let last = *tokens.last()?;
    if last == "ex" {
        return Some("ex");
    }
    if last == "EX" {
        return Some("EX");
    }
    let upper = last.to_uppercase();
    match upper.as_str() {
        "EX" => Some(EX_EITHER_ERA),
        "V" => Some("V"),
        "VMAX" => Some("VMAX"),
        "VSTAR" => Some("VSTAR"),
        "GX" => Some("GX"),
        "BREAK" => Some("BREAK"),
        "PRIME" => Some("Prime"),
        "LV.X" | "LVX" => Some("LV.X"),
        _ => None,
    }
}

fn same_mechanic(a: Option<&str>, b: Option<&str>) -> bool {
    if a == Some(EX_EITHER_ERA) || b == Some(EX_EITHER_ERA) {
        let is_ex = |m: Option<&str>| matches!(m, Some("ex" | "EX" | EX_EITHER_ERA));
        return is_ex(a) && is_ex(b);
    }
    a == b
}

fn variant_match(record: &IdentificationRecord, candidate: &CandidateCard, config: &MatchConfig) -> FactorOutcome {
    let weights = &config.weights;
    let Some(read) = record.search_name() else {
        return FactorOutcome::none();
    };

    let (read_team, card_team) = (team_size(read), team_size(&candidate.name));
    if read_team != card_team {
        return FactorOutcome::award(
            weights.team_mismatch,
            format!("card shows {} Pokémon, candidate has {}", read_team, card_team),
        );
    }

    let (read_mechanic, card_mechanic) = (mechanic(read), mechanic(&candidate.name));
    if !same_mechanic(read_mechanic, card_mechanic) {
        return FactorOutcome::award(
            weights.mechanic_mismatch,
            format!(
                "variant {} does not match candidate {}",
                read_mechanic.unwrap_or("regular"),
                card_mechanic.unwrap_or("regular")
            ),
        );
    }
    FactorOutcome::none()
}

// ============================================================================
// Secondary attributes
// ============================================================================

fn rarity_match(record: &IdentificationRecord, candidate: &CandidateCard, config: &MatchConfig) -> FactorOutcome {
    let (Some(read), Some(printed)) = (record.rarity.as_deref(), candidate.rarity.as_deref()) else {
        return FactorOutcome::none();
    };
    if normalize_name(read) == normalize_name(printed) {
        FactorOutcome::award(config.weights.rarity, format!("rarity '{}' matches", printed))
    } else {
        FactorOutcome::none()
    }
}

fn hp_match(record: &IdentificationRecord, candidate: &CandidateCard, config: &MatchConfig) -> FactorOutcome {
    let read = record.hp.as_deref().and_then(normalize_hp);
    let printed = candidate.hp.as_deref().and_then(normalize_hp);
    match (read, printed) {
        (Some(r), Some(p)) if r == p => FactorOutcome::award(config.weights.hp, format!("HP {} matches", p)),
        _ => FactorOutcome::none(),
    }
}

fn type_match(record: &IdentificationRecord, candidate: &CandidateCard, config: &MatchConfig) -> FactorOutcome {
    if record.types.is_empty() || candidate.types.is_empty() {
        return FactorOutcome::none();
    }
    let has = |t: &String| candidate.types.iter().any(|c| c.eq_ignore_ascii_case(t));
    if record.types.iter().all(has) {
        FactorOutcome::award(
            config.weights.types_match,
            format!("types {} match", record.types.join("/")),
        )
    } else if !record.types.iter().any(has) {
        FactorOutcome::award(
            config.weights.types_conflict,
            format!(
                "types {} conflict with candidate {}",
                record.types.join("/"),
                candidate.types.join("/")
            ),
        )
    } else {
        FactorOutcome::none()
    }
}

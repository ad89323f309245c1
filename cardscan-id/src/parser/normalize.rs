//! Field cleanup applied after extraction
//!
//! All functions are total: unusable input yields `None`, never a panic.

use crate::catalog::set_families::{same_family, set_key};
use once_cell::sync::Lazy;
use regex::Regex;

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("static regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

static VAGUE_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(likely|possibly|probably|perhaps|maybe|appears to be|seems to be|might be|could be|looks like|not sure|uncertain|unclear|or similar)\b|\?",
    )
    .expect("static regex")
});

const PLACEHOLDERS: &[&str] = &[
    "unknown",
    "n/a",
    "na",
    "none",
    "null",
    "-",
    "--",
    "not visible",
    "not available",
    "not legible",
    "unreadable",
    "illegible",
    "unclear",
    "not shown",
];

const KNOWN_TYPES: &[&str] = &[
    "Grass",
    "Fire",
    "Water",
    "Lightning",
    "Psychic",
    "Fighting",
    "Darkness",
    "Metal",
    "Fairy",
    "Dragon",
    "Colorless",
];

/// Common set name spellings mapped to the card database's canonical names
const SET_ALIASES: &[(&str, &str)] = &[
    ("base set", "Base"),
    ("base set 1", "Base"),
    ("base", "Base"),
    ("1st edition base set", "Base"),
    ("base set 2", "Base Set 2"),
    ("base 2", "Base Set 2"),
    ("team rocket", "Team Rocket"),
    ("expedition", "Expedition Base Set"),
    ("champions path", "Champion's Path"),
    ("champion path", "Champion's Path"),
    ("pokemon go", "Pokémon GO"),
    ("pokémon go", "Pokémon GO"),
    ("unleashed", "HS—Unleashed"),
    ("hs unleashed", "HS—Unleashed"),
    ("undaunted", "HS—Undaunted"),
    ("hs undaunted", "HS—Undaunted"),
    ("triumphant", "HS—Triumphant"),
    ("hs triumphant", "HS—Triumphant"),
    ("heartgold soulsilver", "HeartGold & SoulSilver"),
    ("heartgold and soulsilver", "HeartGold & SoulSilver"),
    ("black and white", "Black & White"),
    ("xy base", "XY"),
    ("sun and moon", "Sun & Moon"),
    ("sword and shield", "Sword & Shield"),
    ("scarlet and violet", "Scarlet & Violet"),
    ("pokemon 151", "151"),
    ("scarlet & violet 151", "151"),
    ("scarlet and violet 151", "151"),
];

/// Highest collector number in the original Base set
const BASE_SET_SIZE: u32 = 102;

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// True for values that mean "nothing here"
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().trim_matches(|c: char| c == '.' || c == '"').to_lowercase();
    v.is_empty()
        || PLACEHOLDERS.contains(&v.as_str())
        || v.starts_with("not visible")
        || v.starts_with("unknown")
}

/// True when the value contains hedging language
pub fn is_vague(value: &str) -> bool {
    VAGUE_PHRASES.is_match(value)
}

/// Remove hedging phrases, keeping the substantive remainder
pub fn strip_vague(value: &str) -> String {
    collapse_whitespace(&VAGUE_PHRASES.replace_all(value, " "))
}

/// Clean a card name: drop parentheticals and stray symbols
///
/// Keeps letters in any script, digits, spaces and the punctuation that
/// appears in real card names (`'`, `-`, `.`, `&`, `:`, gender symbols).
pub fn clean_name(raw: &str) -> Option<String> {
    if is_placeholder(raw) {
        return None;
    }
    let without_notes = PARENTHETICAL.replace_all(raw, " ");
    let kept: String = without_notes
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '\'' | '’' | '-' | '.' | '&' | ':' | '♀' | '♂') {
                c
            } else {
                ' '
            }
        })
        .collect();
    let cleaned = collapse_whitespace(&kept);
    let cleaned = cleaned.trim_matches(|c: char| matches!(c, '-' | '.' | ':' | '&' | ' '));
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Normalized collector number plus printed set size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardNumber {
    pub number: String,
    pub set_total: Option<u32>,
}

/// Parse a collector number such as `"4/102"`, `"#025"`, `"SV65/SV94"`, `"177a"`
///
/// Pure digit numbers lose leading zeros; letter prefixes and suffixes are
/// kept. Returns `None` when no digit survives or the text is descriptive.
pub fn parse_card_number(raw: &str) -> Option<CardNumber> {
    if is_placeholder(raw) {
        return None;
    }
    let mut text = raw.trim().to_string();
    for prefix in ["number", "card no.", "card no", "no.", "no", "nr.", "#"] {
        let head = text.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            text = text[prefix.len()..].trim_start().to_string();
            break;
        }
    }
    let text = text.trim_start_matches('#').trim();

    let (left, right) = match text.split_once('/') {
        Some((l, r)) => (l.trim(), Some(r.trim())),
        None => (text, None),
    };

    if left.is_empty()
        || !left.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        || !left.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }

    let number = if left.chars().all(|c| c.is_ascii_digit()) {
        let stripped = left.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        uppercase_letter_prefix(left)
    };

    let set_total = right
        .filter(|r| !r.is_empty() && r.chars().all(|c| c.is_ascii_digit()))
        .and_then(|r| r.parse::<u32>().ok());

    Some(CardNumber { number, set_total })
}

/// `sv65` -> `SV65`, `177a` stays `177a`
fn uppercase_letter_prefix(number: &str) -> String {
    let digits_at = number.find(|c: char| c.is_ascii_digit()).unwrap_or(0);
    let (prefix, rest) = number.split_at(digits_at);
    format!("{}{}", prefix.to_ascii_uppercase(), rest)
}

/// Canonical set name for database lookups
///
/// Also corrects "Base" to "Base Set 2" when the collector number is beyond
/// the original Base set's range.
pub fn canonical_set_name(raw: &str, number: Option<&str>) -> Option<String> {
    if is_placeholder(raw) {
        return None;
    }
    let cleaned = collapse_whitespace(&PARENTHETICAL.replace_all(raw, " "));
    let cleaned = cleaned
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == ',')
        .trim();
    if cleaned.is_empty() {
        return None;
    }

    let key = cleaned.to_lowercase();
    let key = key.strip_prefix("pokemon tcg ").unwrap_or(&key);
    let canonical = SET_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| cleaned.to_string());

    let beyond_base = number
        .and_then(|n| n.parse::<u32>().ok())
        .is_some_and(|n| n > BASE_SET_SIZE);
    if canonical == "Base" && beyond_base {
        return Some("Base Set 2".to_string());
    }

    Some(canonical)
}

/// Printed set size (the `/102` in `4/102`) per set, canonical names
const PRINTED_TOTALS: &[(u32, &str)] = &[
    (102, "Base"),
    (64, "Jungle"),
    (62, "Fossil"),
    (130, "Base Set 2"),
    (82, "Team Rocket"),
    (132, "Gym Heroes"),
    (132, "Gym Challenge"),
    (111, "Neo Genesis"),
    (75, "Neo Discovery"),
    (64, "Neo Revelation"),
    (105, "Neo Destiny"),
    (110, "Legendary Collection"),
    (165, "Expedition Base Set"),
    (147, "Aquapolis"),
    (144, "Skyridge"),
    (130, "Diamond & Pearl"),
    (123, "HeartGold & SoulSilver"),
    (95, "HS—Unleashed"),
    (90, "HS—Undaunted"),
    (102, "HS—Triumphant"),
    (95, "Call of Legends"),
    (114, "Black & White"),
    (146, "XY"),
    (106, "Flashfire"),
    (111, "Furious Fists"),
    (119, "Phantom Forces"),
    (160, "Primal Clash"),
    (108, "Roaring Skies"),
    (98, "Ancient Origins"),
    (162, "BREAKthrough"),
    (122, "BREAKpoint"),
    (83, "Generations"),
    (124, "Fates Collide"),
    (114, "Steam Siege"),
    (108, "Evolutions"),
    (149, "Sun & Moon"),
    (145, "Guardians Rising"),
    (147, "Burning Shadows"),
    (111, "Crimson Invasion"),
    (156, "Ultra Prism"),
    (131, "Forbidden Light"),
    (168, "Celestial Storm"),
    (214, "Lost Thunder"),
    (181, "Team Up"),
    (214, "Unbroken Bonds"),
    (236, "Unified Minds"),
    (68, "Hidden Fates"),
    (236, "Cosmic Eclipse"),
    (202, "Sword & Shield"),
    (192, "Rebel Clash"),
    (189, "Darkness Ablaze"),
    (73, "Champion's Path"),
    (185, "Vivid Voltage"),
    (72, "Shining Fates"),
    (163, "Battle Styles"),
    (198, "Chilling Reign"),
    (203, "Evolving Skies"),
    (25, "Celebrations"),
    (264, "Fusion Strike"),
    (172, "Brilliant Stars"),
    (189, "Astral Radiance"),
    (78, "Pokémon GO"),
    (196, "Lost Origin"),
    (195, "Silver Tempest"),
    (159, "Crown Zenith"),
    (198, "Scarlet & Violet"),
    (193, "Paldea Evolved"),
    (197, "Obsidian Flames"),
    (165, "151"),
    (182, "Paradox Rift"),
    (91, "Paldean Fates"),
    (162, "Temporal Forces"),
    (167, "Twilight Masquerade"),
    (64, "Shrouded Fable"),
    (142, "Stellar Crown"),
    (191, "Surging Sparks"),
];

/// Sets printed with this set size
pub fn sets_with_total(total: u32) -> Vec<&'static str> {
    PRINTED_TOTALS
        .iter()
        .filter(|(size, _)| *size == total)
        .map(|(_, name)| *name)
        .collect()
}

/// Check the read set name against the printed set size
///
/// - A set whose size matches the total is kept.
/// - Otherwise the one sibling in the same series with that size replaces it
///   (`Base` read on a `/130` card becomes `Base Set 2`).
/// - With no set read, a total printed by exactly one set names that set.
///
/// Anything ambiguous leaves the set as read.
pub fn reconcile_set(set_name: Option<String>, set_total: Option<u32>) -> Option<String> {
    let Some(total) = set_total else {
        return set_name;
    };
    let sized = sets_with_total(total);

    match set_name {
        Some(read) => {
            let key = set_key(&read);
            if sized.iter().any(|s| set_key(s) == key) {
                return Some(read);
            }
            let mut siblings = sized.iter().filter(|s| same_family(&read, s));
            match (siblings.next(), siblings.next()) {
                (Some(corrected), None) => {
                    tracing::debug!(read = %read, corrected, total, "Set corrected from printed set size");
                    Some((*corrected).to_string())
                }
                _ => Some(read),
            }
        }
        None => match sized.as_slice() {
            [only] => {
                tracing::debug!(set = *only, total, "Set inferred from printed set size");
                Some((*only).to_string())
            }
            _ => None,
        },
    }
}

/// HP reduced to its digits
pub fn normalize_hp(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn canonical_type(raw: &str) -> Option<&'static str> {
    let key = raw.trim().to_lowercase();
    let key = key.trim_end_matches(" type").trim_end_matches(" energy");
    let alias = match key {
        "electric" => "lightning",
        "dark" => "darkness",
        "steel" => "metal",
        "normal" | "colourless" => "colorless",
        other => other,
    };
    KNOWN_TYPES
        .iter()
        .copied()
        .find(|t| t.eq_ignore_ascii_case(alias))
}

/// Energy types, validated and de-duplicated, at most two
pub fn normalize_types<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for chunk in raw {
        for part in chunk
            .as_ref()
            .split(|c| c == '/' || c == ',' || c == '&')
            .flat_map(|p| p.split(" and "))
        {
            if let Some(t) = canonical_type(part) {
                if !out.iter().any(|o| o == t) {
                    out.push(t.to_string());
                }
            }
        }
    }
    out.truncate(2);
    out
}

/// Rarity with placeholders removed
pub fn normalize_rarity(raw: &str) -> Option<String> {
    if is_placeholder(raw) {
        return None;
    }
    let cleaned = collapse_whitespace(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

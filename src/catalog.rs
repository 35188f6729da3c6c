//! Model catalog normalization.
//!
//! Turns a provider's raw model list into display-friendly descriptors. Names,
//! tiers and descriptions are derived heuristically from id substrings; ids
//! that match no known pattern fall back to a title-cased rendition of their
//! hyphen-separated segments. The result is best-effort, not authoritative.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::{ModelDescriptor, ModelTier, RawModel};
use crate::providers::ProviderFamily;

// claude-3-5-sonnet-20241022, claude-3-haiku-20240307
static CLAUDE_VERSION_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^claude-(\d+)(?:-(\d{1,2}))?-(sonnet|opus|haiku)(?:-|$)")
        .expect("CLAUDE_VERSION_FIRST is a valid regex pattern")
});

// claude-sonnet-4-20250514, claude-opus-4-1-20250805, claude-haiku-4-5
static CLAUDE_FAMILY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^claude-(sonnet|opus|haiku)-(\d+)(?:-(\d{1,2}))?(?:-|$)")
        .expect("CLAUDE_FAMILY_FIRST is a valid regex pattern")
});

static DATE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{6,8}$").expect("DATE_SEGMENT is a valid regex pattern"));

// Gemini entries that cannot generate exercises.
const GEMINI_NON_CHAT: [&str; 4] = ["embedding", "aqa", "imagen", "tts"];

pub fn normalize(raw: Vec<RawModel>, family: ProviderFamily, excluded_tiers: &[String]) -> Vec<ModelDescriptor> {
    let total = raw.len();
    let mut models: Vec<ModelDescriptor> = raw
        .into_iter()
        .filter(|m| is_offered(&m.id, family, excluded_tiers))
        .map(|m| {
            let tier = derive_tier(&m.id);
            ModelDescriptor {
                name: derive_name(&m.id),
                description: describe(tier).to_string(),
                tier,
                created: m.created_at.as_deref().and_then(parse_created),
                id: m.id,
            }
        })
        .collect();

    // Newest first; entries without a timestamp go last. `sort_by` is stable.
    models.sort_by(|a, b| b.created.cmp(&a.created));
    debug!(target: "provider", ?family, total, offered = models.len(), "Model catalog normalized");
    models
}

fn is_offered(id: &str, family: ProviderFamily, excluded_tiers: &[String]) -> bool {
    let lower = id.to_ascii_lowercase();
    if excluded_tiers.iter().any(|t| !t.is_empty() && lower.contains(&t.to_ascii_lowercase())) {
        return false;
    }
    match family {
        ProviderFamily::Claude => lower.starts_with("claude"),
        ProviderFamily::Gemini => lower.contains("gemini") && !GEMINI_NON_CHAT.iter().any(|s| lower.contains(s)),
    }
}

pub fn derive_name(id: &str) -> String {
    let lower = id.to_ascii_lowercase();
    if let Some(c) = CLAUDE_VERSION_FIRST.captures(&lower) {
        let version = join_version(&c[1], c.get(2).map(|m| m.as_str()));
        return format!("Claude {} {}", version, capitalize(&c[3]));
    }
    if let Some(c) = CLAUDE_FAMILY_FIRST.captures(&lower) {
        let version = join_version(&c[2], c.get(3).map(|m| m.as_str()));
        return format!("Claude {} {}", capitalize(&c[1]), version);
    }
    title_case_segments(id)
}

pub fn derive_tier(id: &str) -> ModelTier {
    let lower = id.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["haiku", "flash", "lite"]) {
        ModelTier::Fast
    } else if has(&["sonnet"]) {
        ModelTier::Balanced
    } else if has(&["opus", "pro", "ultra"]) {
        ModelTier::Powerful
    } else {
        ModelTier::Standard
    }
}

fn describe(tier: ModelTier) -> &'static str {
    match tier {
        ModelTier::Fast => "Schnell und günstig, gut für kurze Aufgaben und Hinweise.",
        ModelTier::Balanced => "Ausgewogen zwischen Qualität und Geschwindigkeit.",
        ModelTier::Powerful => "Höchste Qualität für anspruchsvolle Aufgaben, dafür langsamer.",
        ModelTier::Standard => "Allgemeines Sprachmodell.",
    }
}

fn join_version(major: &str, minor: Option<&str>) -> String {
    match minor {
        Some(minor) => format!("{}.{}", major, minor),
        None => major.to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_case_segments(id: &str) -> String {
    id.split('-')
        .filter(|seg| !seg.is_empty() && !DATE_SEGMENT.is_match(seg))
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_created(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

//! Canonical chapter slugs (`g-<group8>-chapter-<label>-<lang>`) and series slugs.
//!
//! The chapter encoding is lossy: only the first eight characters of the group
//! UUID survive, so two groups can share a prefix. Decoding recovers the prefix,
//! the label and the language; resolving back to a concrete chapter is the job
//! of [`crate::detail`], which matches on label + language first.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

pub const UNKNOWN_GROUP: &str = "unknown";
pub const ONESHOT_LABEL: &str = "oneshot";
pub const UNTITLED: &str = "untitled";

const GROUP_SHORT_LEN: usize = 8;

static ONESHOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^one[-\s]?shot$").unwrap());
static CANONICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^g-([a-z0-9]+)-chapter-([a-z0-9._-]+)-([a-z]{2})$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSlug {
    pub group_short: String,
    pub label: String,
    pub lang: String,
}

impl DecodedSlug {
    pub fn is_oneshot(&self) -> bool {
        self.label.eq_ignore_ascii_case(ONESHOT_LABEL)
    }

    pub fn has_known_group(&self) -> bool {
        self.group_short != UNKNOWN_GROUP
    }
}

/// Hyphen-stripped, lowercased first 8 characters of a group UUID.
pub fn group_short(group_id: Option<&str>) -> String {
    match group_id.map(str::trim).filter(|g| !g.is_empty()) {
        Some(g) => g
            .chars()
            .filter(|c| *c != '-')
            .take(GROUP_SHORT_LEN)
            .collect::<String>()
            .to_ascii_lowercase(),
        None => UNKNOWN_GROUP.to_string(),
    }
}

pub fn is_oneshot(label: &str) -> bool {
    ONESHOT_RE.is_match(label.trim())
}

/// Label segment of a canonical slug. Absent, blank and oneshot spellings collapse
/// to `oneshot`; anything else is kept verbatim (URL escaping is the caller's job).
pub fn label_segment(label: Option<&str>) -> String {
    match label {
        Some(l) if !l.trim().is_empty() && !is_oneshot(l) => l.to_string(),
        _ => ONESHOT_LABEL.to_string(),
    }
}

pub fn encode(group_id: Option<&str>, label: Option<&str>, lang: &str) -> String {
    format!(
        "g-{}-chapter-{}-{}",
        group_short(group_id),
        label_segment(label),
        lang.trim().to_ascii_lowercase()
    )
}

/// Parse a canonical slug. Returns `None` for anything outside the grammar.
pub fn decode(slug: &str) -> Option<DecodedSlug> {
    let caps = CANONICAL_RE.captures(slug.trim())?;
    Some(DecodedSlug {
        group_short: caps[1].to_ascii_lowercase(),
        label: caps[2].to_string(),
        lang: caps[3].to_ascii_lowercase(),
    })
}

/// Series slug from a display title: accents folded, lowercase ASCII
/// alphanumerics, single hyphens between runs, `untitled` when nothing is left.
pub fn series_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = false;
    for ch in title.nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        UNTITLED.to_string()
    } else {
        slug.to_string()
    }
}

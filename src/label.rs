//! Chapter-number extraction and the feed ordering built on it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

use crate::types::ChapterRow;

static MARKED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\bch(?:apter)?\.?|#)\s*(\d+(?:\.\d+)?)").unwrap());
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// Chapter number from free text. An explicit `ch.` / `chapter` / `#` marker
/// wins; otherwise the last number in the string (volume numbers come first).
pub fn chapter_number(text: &str) -> Option<f64> {
    if let Some(caps) = MARKED_RE.captures(text) {
        return caps[1].parse().ok();
    }
    NUMBER_RE.find_iter(text).last().and_then(|m| m.as_str().parse().ok())
}

/// Numeric sort key of a label. Oneshots and labels without a number sort after
/// every finite chapter.
pub fn sort_key(label: Option<&str>) -> f64 {
    label.and_then(chapter_number).unwrap_or(f64::INFINITY)
}

/// Canonical feed order: numeric label, then oldest timestamp, then id.
pub fn compare_rows(a: &ChapterRow, b: &ChapterRow) -> Ordering {
    sort_key(a.chapter_label.as_deref())
        .total_cmp(&sort_key(b.chapter_label.as_deref()))
        .then_with(|| match (a.best_timestamp, b.best_timestamp) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_rows(rows: &mut [ChapterRow]) {
    rows.sort_by(compare_rows);
}

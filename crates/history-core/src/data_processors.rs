use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::debug;

use crate::models::{RoundSortKey, RoundTier};

// ── EventDateParser ───────────────────────────────────────────────────────────

/// Parses the `Event Date` cell of a GEM export.
///
/// The export writes `Mon. D, YYYY`, sometimes followed by a time of day
/// (`, 2:30 p.m.` or `, noon`). Anything the strict format rejects goes
/// through a lenient pass that understands those suffixes, full month
/// names and a few numeric layouts.
pub struct EventDateParser;

/// The export's canonical date layout, e.g. `Mar. 10, 2025`.
pub const STRICT_DATE_FORMAT: &str = "%b. %d, %Y";

const LENIENT_DATETIME_FORMATS: &[&str] = &[
    "%b %d, %Y, %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y, %H:%M",
    "%b %d, %Y %H:%M",
    "%d %b %Y %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const LENIENT_DATE_FORMATS: &[&str] = &["%b %d, %Y", "%b %d %Y", "%d %b %Y", "%Y-%m-%d", "%m/%d/%Y"];

const MONTHS: &[(&str, &str)] = &[
    ("jan", "january"),
    ("feb", "february"),
    ("mar", "march"),
    ("apr", "april"),
    ("may", "may"),
    ("jun", "june"),
    ("jul", "july"),
    ("aug", "august"),
    ("sep", "september"),
    ("oct", "october"),
    ("nov", "november"),
    ("dec", "december"),
];

impl EventDateParser {
    /// Strict pass first; on failure rewrite `noon` as `12:00 PM` and retry
    /// leniently. `None` means both passes failed.
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        if let Some(dt) = Self::parse_strict(raw) {
            return Some(dt);
        }
        let rewritten = raw.replace("noon", "12:00 PM");
        let parsed = Self::parse_lenient(&rewritten);
        if parsed.is_none() {
            debug!("EventDateParser: no format matched \"{}\"", raw);
        }
        parsed
    }

    pub fn parse_strict(raw: &str) -> Option<NaiveDateTime> {
        NaiveDate::parse_from_str(raw.trim(), STRICT_DATE_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    pub fn parse_lenient(raw: &str) -> Option<NaiveDateTime> {
        let normalised = normalise_date_text(raw);
        if normalised.is_empty() {
            return None;
        }

        for fmt in LENIENT_DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&normalised, fmt) {
                return Some(dt);
            }
        }
        for fmt in LENIENT_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&normalised, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
        None
    }
}

/// Canonicalise month tokens and meridiem markers so chrono can parse them.
///
/// `Sept. 5, 2024, 2 p.m.` becomes `Sep 5, 2024, 2:00 PM`.
fn normalise_date_text(raw: &str) -> String {
    let text = raw
        .trim()
        .replace("midnight", "12:00 AM")
        .replace("a.m.", "AM")
        .replace("p.m.", "PM");

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());

    for (i, token) in tokens.iter().enumerate() {
        let (core, comma) = match token.strip_suffix(',') {
            Some(stripped) => (stripped, ","),
            None => (*token, ""),
        };

        if let Some(abbrev) = month_abbrev(core) {
            out.push(format!("{abbrev}{comma}"));
            continue;
        }

        // Hour-only times ("2 PM") need explicit minutes.
        let next_is_meridiem = tokens
            .get(i + 1)
            .map(|t| t.eq_ignore_ascii_case("AM") || t.eq_ignore_ascii_case("PM"))
            .unwrap_or(false);
        if next_is_meridiem && !core.is_empty() && core.chars().all(|c| c.is_ascii_digit()) {
            out.push(format!("{core}:00{comma}"));
            continue;
        }

        out.push(token.to_string());
    }

    out.join(" ")
}

fn month_abbrev(token: &str) -> Option<String> {
    let lower = token.trim_end_matches('.').to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if lower == "sept" {
        return Some("Sep".to_string());
    }
    MONTHS
        .iter()
        .find(|(short, long)| lower == *short || lower == *long)
        .map(|(short, _)| {
            let mut chars = short.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
}

// ── OpponentParser ────────────────────────────────────────────────────────────

/// Name and optional GEM ID split out of an `Opponent` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOpponent {
    pub id: Option<String>,
    pub name: String,
}

/// Splits `"Name (ID)"` opponent cells.
pub struct OpponentParser;

impl OpponentParser {
    /// The ID is the text between the last `(` and the `)` after it; the
    /// name is everything before the first `" ("`. Cells without a
    /// parenthesised token keep their raw text as the name.
    pub fn parse(raw: &str) -> ParsedOpponent {
        let id = raw.rfind('(').and_then(|open| {
            let rest = &raw[open + 1..];
            rest.find(')').map(|close| rest[..close].to_string())
        });

        match id {
            Some(id) => {
                let name = match raw.find(" (") {
                    Some(idx) => raw[..idx].to_string(),
                    None => raw.to_string(),
                };
                ParsedOpponent { id: Some(id), name }
            }
            None => ParsedOpponent {
                id: None,
                name: raw.to_string(),
            },
        }
    }

    /// Case-insensitive `bye` anywhere in the cell.
    pub fn is_bye(raw: &str) -> bool {
        raw.to_lowercase().contains("bye")
    }
}

// ── Scalar fields ─────────────────────────────────────────────────────────────

/// `true` only for a result of exactly `win` after trimming, any case.
pub fn is_win(result: &str) -> bool {
    result.trim().eq_ignore_ascii_case("win")
}

/// Parse a `Rating Change` cell; blank or non-numeric cells count as 0.
pub fn parse_rating_change(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    match unsigned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

// ── RoundClassifier ───────────────────────────────────────────────────────────

fn swiss_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("valid swiss round regex"))
}

fn playoff_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^P(\d+)$").expect("valid playoff round regex"))
}

/// Sort key for a round label: Swiss numbers, then `P<n>` playoffs, then
/// anything else. Numbers too large for `u64` fall into the last tier.
pub fn round_sort_key(label: &str) -> RoundSortKey {
    const OTHER: RoundSortKey = RoundSortKey {
        tier: RoundTier::Other,
        sub_rank: 0,
    };

    if swiss_pattern().is_match(label) {
        return match label.parse::<u64>() {
            Ok(n) => RoundSortKey {
                tier: RoundTier::Swiss,
                sub_rank: n,
            },
            Err(_) => OTHER,
        };
    }

    if let Some(caps) = playoff_pattern().captures(label) {
        return match caps[1].parse::<u64>() {
            Ok(n) => RoundSortKey {
                tier: RoundTier::Playoff,
                sub_rank: n,
            },
            Err(_) => OTHER,
        };
    }

    OTHER
}

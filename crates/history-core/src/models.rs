use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Column names of the GEM match-history export.
pub mod columns {
    pub const EVENT_NAME: &str = "Event Name";
    pub const EVENT_DATE: &str = "Event Date";
    pub const RATED: &str = "Rated";
    pub const ROUND: &str = "Round";
    pub const OPPONENT: &str = "Opponent";
    pub const RESULT: &str = "Result";
    pub const RATING_CHANGE: &str = "Rating Change";

    /// Columns that must be present in the header row.
    pub const REQUIRED: &[&str] = &[OPPONENT];

    /// Export column order used when rendering a match back to a raw row.
    pub const EXPORT_ORDER: &[&str] = &[
        EVENT_NAME,
        EVENT_DATE,
        RATED,
        ROUND,
        OPPONENT,
        RESULT,
        RATING_CHANGE,
    ];
}

/// Starting Elo for the rating time series.
pub const BASELINE_RATING: f64 = 1500.0;

/// Representative name of the group holding matches without an opponent ID.
pub const UNKNOWN_OPPONENT: &str = "unknown";

// ── Raw export ────────────────────────────────────────────────────────────────

/// `# key: value` header entries of an export, in file order.
///
/// Display-only; values are never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    entries: Vec<(String, String)>,
}

impl Meta {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Value for `key`; a repeated key resolves to its last occurrence.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One CSV data line: column name → raw string value, column order kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// 1-based physical line number in the source text.
    pub line: usize,
    pub fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// The tokenized CSV body: trimmed header names plus one [`RawRow`] per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

// ── Canonical match ───────────────────────────────────────────────────────────

/// Whether a match counted toward the player's rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rated {
    Yes,
    No,
    Unknown,
}

impl Rated {
    /// Interpret the export's `Rated` cell; anything but yes/no is unknown.
    pub fn from_field(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("yes") => Rated::Yes,
            Some("no") => Rated::No,
            _ => Rated::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rated::Yes => "Yes",
            Rated::No => "No",
            Rated::Unknown => "",
        }
    }
}

/// A single normalized match. Immutable once built by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub event_name: String,
    pub event_date: NaiveDateTime,
    pub rated: Rated,
    /// Numeric literal for Swiss rounds, `P<digits>` for playoffs.
    pub round: String,
    /// Opponent cell exactly as exported.
    pub opponent_raw: String,
    /// GEM ID from the trailing parenthesised token, if any.
    pub opponent_id: Option<String>,
    pub opponent_name: String,
    pub result: String,
    pub user_win: bool,
    pub rating_change: f64,
    pub is_bye: bool,
}

impl Match {
    /// Grouping identity of this match's opponent.
    pub fn opponent_key(&self) -> OpponentKey {
        match &self.opponent_id {
            Some(id) => OpponentKey::Id(id.clone()),
            None => OpponentKey::Unknown,
        }
    }

    pub fn is_rated(&self) -> bool {
        self.rated == Rated::Yes
    }

    /// Render this match back into the export's column vocabulary.
    ///
    /// Normalizing the result yields an identical [`Match`].
    pub fn to_raw_row(&self, line: usize) -> RawRow {
        let fields = vec![
            (columns::EVENT_NAME, self.event_name.clone()),
            (
                columns::EVENT_DATE,
                self.event_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            (columns::RATED, self.rated.as_str().to_string()),
            (columns::ROUND, self.round.clone()),
            (columns::OPPONENT, self.opponent_raw.clone()),
            (columns::RESULT, self.result.clone()),
            (columns::RATING_CHANGE, self.rating_change.to_string()),
        ];
        RawRow {
            line,
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }
}

/// Opponent grouping key. Matches without an ID share one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpponentKey {
    Id(String),
    Unknown,
}

impl OpponentKey {
    pub fn id(&self) -> Option<&str> {
        match self {
            OpponentKey::Id(id) => Some(id),
            OpponentKey::Unknown => None,
        }
    }
}

// ── Derived views ─────────────────────────────────────────────────────────────

/// `wins / total`, undefined for an empty group.
pub fn win_rate(wins: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(wins as f64 / total as f64)
    }
}

/// Views that carry a (possibly undefined) win rate.
pub trait WinRated {
    fn win_rate(&self) -> Option<f64>;
}

/// Head-to-head record against one opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentStat {
    pub opponent_id: Option<String>,
    /// Name from the last occurrence of this ID in file order.
    pub opponent_name: String,
    pub match_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub win_rate: Option<f64>,
}

impl WinRated for OpponentStat {
    fn win_rate(&self) -> Option<f64> {
        self.win_rate
    }
}

/// Ordering class of a round label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoundTier {
    Swiss,
    Playoff,
    Other,
}

/// Composite sort key: tier first, then the label's numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoundSortKey {
    pub tier: RoundTier,
    pub sub_rank: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStat {
    pub round: String,
    pub match_count: usize,
    pub win_count: usize,
    pub win_rate: Option<f64>,
    pub sort_key: RoundSortKey,
}

impl WinRated for RoundStat {
    fn win_rate(&self) -> Option<f64> {
        self.win_rate
    }
}

/// Cumulative rating at the end of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub date: NaiveDate,
    pub rating: f64,
}

/// Net rating exchanged with one opponent over rated matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingDelta {
    pub opponent_id: Option<String>,
    pub opponent_name: String,
    pub total_change: f64,
    pub match_count: usize,
}

/// Scalar summary of a (possibly filtered) match table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub wins: usize,
    /// `wins / count`, 0 for an empty table.
    pub win_rate: f64,
    pub unique_opponents: usize,
    /// Sum of every row's rating change, rated or not.
    pub net_rating_change: f64,
}

//! Column predicates over tabular views.
//!
//! A [`FilterModel`] maps a column name to one `contains` condition or a
//! single-level AND/OR compound of them. Columns are ANDed together.
//! Problems with the model are never fatal: the affected column is skipped
//! and reported as a [`FilterModelError`].

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use history_core::error::{FilterModelError, Result};
use history_core::formatting::format_win_rate;
use history_core::models::{
    columns, Match, OpponentKey, OpponentStat, RatingPoint, RawRow, RoundStat, Summary,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The only matching mode with defined semantics.
pub const CONTAINS: &str = "contains";

// ── Filterable rows ───────────────────────────────────────────────────────────

/// A row whose cells can be addressed by column name.
pub trait FilterableRow {
    /// Whether `name` is a column of this row.
    fn has_column(&self, name: &str) -> bool;

    /// Text of the cell under `name`; `None` for a null cell or an
    /// unknown column.
    fn cell(&self, name: &str) -> Option<Cow<'_, str>>;
}

pub const OPPONENT_ID: &str = "Opponent ID";
pub const OPPONENT_NAME: &str = "Opponent Name";
pub const MATCHES: &str = "Matches";
pub const WINS: &str = "Wins";
pub const LOSSES: &str = "Losses";
pub const WIN_RATE: &str = "Win Rate";
pub const DATE: &str = "Date";
pub const RATING: &str = "Rating";

impl FilterableRow for Match {
    fn has_column(&self, name: &str) -> bool {
        columns::EXPORT_ORDER.contains(&name) || name == OPPONENT_ID || name == OPPONENT_NAME
    }

    fn cell(&self, name: &str) -> Option<Cow<'_, str>> {
        let text: Cow<'_, str> = match name {
            columns::EVENT_NAME => Cow::Borrowed(&self.event_name),
            columns::EVENT_DATE => Cow::Owned(self.event_date.format("%Y-%m-%d %H:%M").to_string()),
            columns::RATED => Cow::Borrowed(self.rated.as_str()),
            columns::ROUND => Cow::Borrowed(&self.round),
            columns::OPPONENT => Cow::Borrowed(&self.opponent_raw),
            columns::RESULT => Cow::Borrowed(&self.result),
            columns::RATING_CHANGE => Cow::Owned(self.rating_change.to_string()),
            OPPONENT_ID => Cow::Borrowed(self.opponent_id.as_deref()?),
            OPPONENT_NAME => Cow::Borrowed(&self.opponent_name),
            _ => return None,
        };
        Some(text)
    }
}

impl FilterableRow for OpponentStat {
    fn has_column(&self, name: &str) -> bool {
        [OPPONENT_ID, OPPONENT_NAME, MATCHES, WINS, LOSSES, WIN_RATE].contains(&name)
    }

    fn cell(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            OPPONENT_ID => self.opponent_id.as_deref().map(Cow::Borrowed),
            OPPONENT_NAME => Some(Cow::Borrowed(&self.opponent_name)),
            MATCHES => Some(Cow::Owned(self.match_count.to_string())),
            WINS => Some(Cow::Owned(self.win_count.to_string())),
            LOSSES => Some(Cow::Owned(self.loss_count.to_string())),
            WIN_RATE => self.win_rate.map(|r| Cow::Owned(format_win_rate(Some(r)))),
            _ => None,
        }
    }
}

impl FilterableRow for RoundStat {
    fn has_column(&self, name: &str) -> bool {
        [columns::ROUND, MATCHES, WINS, WIN_RATE].contains(&name)
    }

    fn cell(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            columns::ROUND => Some(Cow::Borrowed(&self.round)),
            MATCHES => Some(Cow::Owned(self.match_count.to_string())),
            WINS => Some(Cow::Owned(self.win_count.to_string())),
            WIN_RATE => self.win_rate.map(|r| Cow::Owned(format_win_rate(Some(r)))),
            _ => None,
        }
    }
}

impl FilterableRow for RatingPoint {
    fn has_column(&self, name: &str) -> bool {
        name == DATE || name == RATING
    }

    fn cell(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            DATE => Some(Cow::Owned(self.date.format("%Y-%m-%d").to_string())),
            RATING => Some(Cow::Owned(self.rating.to_string())),
            _ => None,
        }
    }
}

impl FilterableRow for RawRow {
    fn has_column(&self, name: &str) -> bool {
        self.fields.iter().any(|(column, _)| column == name)
    }

    fn cell(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(Cow::Borrowed)
    }
}

// ── Filter model ──────────────────────────────────────────────────────────────

/// A single `{mode, value}` condition.
///
/// Grid-style `{"type": ..., "filter": ...}` keys are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(alias = "type", default = "default_mode")]
    pub mode: String,
    #[serde(alias = "filter")]
    pub value: String,
}

fn default_mode() -> String {
    CONTAINS.to_string()
}

impl Condition {
    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            mode: CONTAINS.to_string(),
            value: value.into(),
        }
    }

    fn is_supported(&self) -> bool {
        self.mode.trim().eq_ignore_ascii_case(CONTAINS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

/// The filter attached to one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnFilter {
    Compound {
        operator: Operator,
        #[serde(alias = "conditions")]
        subconditions: Vec<Condition>,
    },
    Single(Condition),
}

/// Column name → filter. Columns combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterModel {
    columns: BTreeMap<String, ColumnFilter>,
}

impl FilterModel {
    /// Parse a JSON object of the form
    /// `{"Opponent": {"mode": "contains", "value": "bob"}}`.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with(mut self, column: impl Into<String>, filter: ColumnFilter) -> Self {
        self.columns.insert(column.into(), filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnFilter)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Lower-cased needles ready for matching.
#[derive(Debug)]
enum Predicate {
    All(Vec<String>),
    Any(Vec<String>),
}

impl Predicate {
    fn matches(&self, cell: Option<&str>) -> bool {
        // Null cells never match.
        let Some(cell) = cell else {
            return false;
        };
        let haystack = cell.to_lowercase();
        match self {
            Predicate::All(needles) => needles.iter().all(|n| haystack.contains(n.as_str())),
            Predicate::Any(needles) => needles.iter().any(|n| haystack.contains(n.as_str())),
        }
    }
}

// ── FilterEngine ──────────────────────────────────────────────────────────────

/// Rows that passed a filter plus the model problems that were skipped.
#[derive(Debug)]
pub struct FilterOutcome<'a, T> {
    pub rows: Vec<&'a T>,
    pub skipped: Vec<FilterModelError>,
}

/// A validated filter model, usable as a row predicate.
#[derive(Debug, Default)]
pub struct CompiledFilter {
    predicates: Vec<(String, Predicate)>,
    /// Columns dropped while compiling.
    pub skipped: Vec<FilterModelError>,
}

impl CompiledFilter {
    /// `true` when `row` satisfies every surviving column predicate.
    pub fn matches<T: FilterableRow>(&self, row: &T) -> bool {
        self.predicates
            .iter()
            .all(|(column, predicate)| predicate.matches(row.cell(column).as_deref()))
    }

    /// Whether no column predicate survived compilation.
    pub fn is_noop(&self) -> bool {
        self.predicates.is_empty()
    }
}

pub struct FilterEngine;

impl FilterEngine {
    /// Keep the rows satisfying every column filter in `model`.
    ///
    /// Unknown columns and unsupported modes are skipped and reported.
    /// Scanning stops once no rows remain; the model is still validated.
    pub fn apply<'a, T: FilterableRow>(rows: &'a [T], model: &FilterModel) -> FilterOutcome<'a, T> {
        let compiled = Self::compile(rows.first(), model);
        let mut kept: Vec<&T> = rows.iter().collect();

        for (column, predicate) in &compiled.predicates {
            if kept.is_empty() {
                break;
            }
            kept.retain(|row| predicate.matches(row.cell(column).as_deref()));
            debug!("FilterEngine: {} rows after {:?}", kept.len(), column);
        }

        FilterOutcome {
            rows: kept,
            skipped: compiled.skipped,
        }
    }

    /// Validate `model` against `sample`, a representative row of the table
    /// it will run on. Without a sample, column names cannot be checked.
    pub fn compile<T: FilterableRow>(sample: Option<&T>, model: &FilterModel) -> CompiledFilter {
        let mut compiled = CompiledFilter::default();

        for (column, filter) in model.iter() {
            if let Some(row) = sample {
                if !row.has_column(column) {
                    warn!("Skipping filter on unknown column {:?}", column);
                    compiled
                        .skipped
                        .push(FilterModelError::UnknownColumn(column.to_string()));
                    continue;
                }
            }

            if let Some(predicate) = Self::compile_column(column, filter, &mut compiled.skipped) {
                compiled.predicates.push((column.to_string(), predicate));
            }
        }

        compiled
    }

    /// Scalar summary of a match table. Byes are excluded; the rating
    /// change of every other row is summed, rated or not.
    pub fn summarize<'a, I>(matches: I) -> Summary
    where
        I: IntoIterator<Item = &'a Match>,
    {
        let mut summary = Summary::default();
        let mut opponents: HashSet<OpponentKey> = HashSet::new();

        for m in matches.into_iter().filter(|m| !m.is_bye) {
            summary.count += 1;
            if m.user_win {
                summary.wins += 1;
            }
            summary.net_rating_change += m.rating_change;
            opponents.insert(m.opponent_key());
        }

        summary.unique_opponents = opponents.len();
        summary.win_rate = if summary.count == 0 {
            0.0
        } else {
            summary.wins as f64 / summary.count as f64
        };
        summary
    }

    fn compile_column(
        column: &str,
        filter: &ColumnFilter,
        skipped: &mut Vec<FilterModelError>,
    ) -> Option<Predicate> {
        if let ColumnFilter::Compound { subconditions, .. } = filter {
            if subconditions.is_empty() {
                warn!("Ignoring compound filter with no conditions on column {:?}", column);
                skipped.push(FilterModelError::EmptyCompound(column.to_string()));
                return None;
            }
        }

        let mut supported = |condition: &Condition| {
            if condition.is_supported() {
                Some(condition.value.to_lowercase())
            } else {
                warn!(
                    "Ignoring unsupported filter mode {:?} on column {:?}",
                    condition.mode, column
                );
                skipped.push(FilterModelError::UnsupportedMode {
                    column: column.to_string(),
                    mode: condition.mode.clone(),
                });
                None
            }
        };

        match filter {
            ColumnFilter::Single(condition) => {
                supported(condition).map(|needle| Predicate::All(vec![needle]))
            }
            ColumnFilter::Compound {
                operator,
                subconditions,
            } => {
                let needles: Vec<String> = subconditions.iter().filter_map(&mut supported).collect();
                if needles.is_empty() {
                    return None;
                }
                Some(match operator {
                    Operator::And => Predicate::All(needles),
                    Operator::Or => Predicate::Any(needles),
                })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Raw row → canonical [`Match`] conversion.

use history_core::data_processors::{
    is_win, parse_rating_change, EventDateParser, OpponentParser,
};
use history_core::error::{HistoryError, Result};
use history_core::models::{columns, Match, RawRow, RawTable, Rated};
use tracing::debug;

/// Stateless converter from [`RawTable`] rows to [`Match`] records.
pub struct MatchNormalizer;

impl MatchNormalizer {
    /// Normalize every row of `table`, in file order.
    ///
    /// Fails with [`HistoryError::Schema`] when a required column is missing
    /// and with [`HistoryError::DateParse`] on the first row whose event
    /// date cannot be resolved. No partial result is returned.
    pub fn normalize(table: &RawTable) -> Result<Vec<Match>> {
        for column in columns::REQUIRED {
            if !table.has_column(column) {
                return Err(HistoryError::Schema {
                    column: (*column).to_string(),
                });
            }
        }

        let matches = table
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| Self::normalize_row(row, idx + 1))
            .collect::<Result<Vec<Match>>>()?;

        debug!(
            "MatchNormalizer: {} matches ({} byes)",
            matches.len(),
            matches.iter().filter(|m| m.is_bye).count()
        );
        Ok(matches)
    }

    /// Normalize a single row. `row_number` is the 1-based data-row index
    /// reported in errors.
    pub fn normalize_row(row: &RawRow, row_number: usize) -> Result<Match> {
        let field = |name: &str| row.get(name).unwrap_or_default();

        let raw_date = field(columns::EVENT_DATE);
        let event_date =
            EventDateParser::parse(raw_date).ok_or_else(|| HistoryError::DateParse {
                row: row_number,
                line: row.line,
                value: raw_date.to_string(),
            })?;

        let opponent_raw = field(columns::OPPONENT);
        let opponent = OpponentParser::parse(opponent_raw);
        let result = field(columns::RESULT);

        Ok(Match {
            event_name: field(columns::EVENT_NAME).to_string(),
            event_date,
            rated: Rated::from_field(row.get(columns::RATED)),
            round: field(columns::ROUND).to_string(),
            opponent_raw: opponent_raw.to_string(),
            opponent_id: opponent.id,
            opponent_name: opponent.name,
            result: result.to_string(),
            user_win: is_win(result),
            rating_change: parse_rating_change(field(columns::RATING_CHANGE)),
            is_bye: OpponentParser::is_bye(opponent_raw),
        })
    }

    /// Render canonical matches back into a raw table in export layout.
    pub fn to_raw_table(matches: &[Match]) -> RawTable {
        RawTable {
            headers: columns::EXPORT_ORDER.iter().map(|c| c.to_string()).collect(),
            rows: matches
                .iter()
                .enumerate()
                .map(|(idx, m)| m.to_raw_row(idx + 2))
                .collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

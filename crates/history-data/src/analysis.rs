//! Load-and-analyse pipeline for a match-history export.
//!
//! Reads the export, normalizes it into the immutable match table and
//! computes the headline [`Overview`], returning a [`HistoryAnalysis`]
//! that every other view is derived from.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use history_core::error::Result;
use history_core::models::{Match, Meta, RawTable, BASELINE_RATING};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::AggregationEngine;
use crate::filter::FilterEngine;
use crate::normalizer::MatchNormalizer;
use crate::reader;

// ── Public types ──────────────────────────────────────────────────────────────

/// Headline numbers over the whole table. Byes are not counted as matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub matches: usize,
    pub wins: usize,
    pub losses: usize,
    /// `wins / matches`, 0 for an empty table.
    pub win_rate: f64,
    pub unique_opponents: usize,
    pub byes: usize,
    /// Distinct event names among non-bye matches.
    pub events: usize,
    /// Last value of the rating series, or the baseline with no rated play.
    pub final_rating: f64,
    /// Sum of every non-bye rating change, rated or not.
    pub net_rating_change: f64,
    pub first_match: Option<NaiveDate>,
    pub last_match: Option<NaiveDate>,
}

impl Overview {
    pub fn from_matches(matches: &[Match]) -> Self {
        let summary = FilterEngine::summarize(matches);
        let played: Vec<&Match> = matches.iter().filter(|m| !m.is_bye).collect();

        let events: HashSet<&str> = played.iter().map(|m| m.event_name.as_str()).collect();
        let final_rating = AggregationEngine::rating_time_series(matches)
            .last()
            .map_or(BASELINE_RATING, |p| p.rating);

        Self {
            matches: summary.count,
            wins: summary.wins,
            losses: summary.count - summary.wins,
            win_rate: summary.win_rate,
            unique_opponents: summary.unique_opponents,
            byes: matches.len() - played.len(),
            events: events.len(),
            final_rating,
            net_rating_change: summary.net_rating_change,
            first_match: played.iter().map(|m| m.event_date.date()).min(),
            last_match: played.iter().map(|m| m.event_date.date()).max(),
        }
    }
}

/// Metadata produced alongside the analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this analysis was generated.
    pub generated_at: String,
    /// Data rows in the export, byes included.
    pub rows_loaded: usize,
    pub byes_skipped: usize,
    /// Wall-clock seconds spent reading and tokenizing the export.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent normalizing rows into matches.
    pub normalize_time_seconds: f64,
}

/// The complete output of [`analyze_history`].
#[derive(Debug, Clone)]
pub struct HistoryAnalysis {
    /// Export header entries, display-only.
    pub meta: Meta,
    /// Every normalized row in file order, byes included.
    pub matches: Vec<Match>,
    pub overview: Overview,
    pub metadata: AnalysisMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline on the export at `path`.
///
/// Any ingestion, schema or date error aborts the whole load.
pub fn analyze_history(path: &Path) -> Result<HistoryAnalysis> {
    let load_start = Instant::now();
    let (meta, table) = reader::load_file(path)?;
    let load_time = load_start.elapsed().as_secs_f64();

    debug!("Loaded {} rows from {}", table.rows.len(), path.display());
    finish(meta, &table, load_time)
}

/// Run the full pipeline on export text already in memory.
pub fn analyze_text(text: &str) -> Result<HistoryAnalysis> {
    let load_start = Instant::now();
    let (meta, table) = reader::parse(text)?;
    let load_time = load_start.elapsed().as_secs_f64();

    finish(meta, &table, load_time)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn finish(meta: Meta, table: &RawTable, load_time: f64) -> Result<HistoryAnalysis> {
    let normalize_start = Instant::now();
    let matches = MatchNormalizer::normalize(table)?;
    let normalize_time = normalize_start.elapsed().as_secs_f64();

    let overview = Overview::from_matches(&matches);
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        rows_loaded: matches.len(),
        byes_skipped: overview.byes,
        load_time_seconds: load_time,
        normalize_time_seconds: normalize_time,
    };

    debug!(
        "Analysis: {} matches, {} byes, {} opponents",
        overview.matches, overview.byes, overview.unique_opponents
    );

    Ok(HistoryAnalysis {
        meta,
        matches,
        overview,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

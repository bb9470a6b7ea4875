//! View requests and the snapshots computed for them.
//!
//! [`compute_view`] is a pure function of the match table and a request,
//! so any number of views can be computed concurrently over one shared
//! table.

use std::borrow::Cow;
use std::time::Instant;

use history_core::error::FilterModelError;
use history_core::models::{Match, OpponentStat, RatingDelta, RatingPoint, RoundStat, Summary};
use history_data::aggregator::{AggregationEngine, DeltaDirection, OpponentSort};
use history_data::analysis::Overview;
use history_data::filter::{FilterEngine, FilterModel};
use serde::Serialize;
use tracing::debug;

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Overview,
    Opponents,
    Rounds,
    Rating,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::Overview,
        ViewKind::Opponents,
        ViewKind::Rounds,
        ViewKind::Rating,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "overview" => Some(Self::Overview),
            "opponents" => Some(Self::Opponents),
            "rounds" => Some(Self::Rounds),
            "rating" => Some(Self::Rating),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Opponents => "opponents",
            Self::Rounds => "rounds",
            Self::Rating => "rating",
        }
    }
}

/// Parameters shared by every view.
#[derive(Debug, Clone)]
pub struct ViewParams {
    /// Applied to the match table before aggregating.
    pub filter: FilterModel,
    /// Drop opponents and rounds at exactly 0% or 100%.
    pub exclude_extremes: bool,
    /// Length of the top-N opponent lists.
    pub top: usize,
    pub sort: OpponentSort,
    pub ascending: bool,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            filter: FilterModel::default(),
            exclude_extremes: false,
            top: 5,
            sort: OpponentSort::Matches,
            ascending: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewRequest {
    /// Caller-chosen identifier echoed back on the snapshot.
    pub id: u64,
    pub kind: ViewKind,
    pub params: ViewParams,
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ViewData {
    Overview {
        overview: Overview,
    },
    Opponents {
        opponents: Vec<OpponentStat>,
        most_played: Vec<OpponentStat>,
        most_lost: Vec<RatingDelta>,
        most_gained: Vec<RatingDelta>,
    },
    Rounds {
        rounds: Vec<RoundStat>,
    },
    Rating {
        series: Vec<RatingPoint>,
    },
}

/// The result of one [`ViewRequest`].
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub request_id: u64,
    pub kind: ViewKind,
    /// Summary of the filtered match table.
    pub summary: Summary,
    pub data: ViewData,
    /// Filter columns that were skipped.
    pub skipped: Vec<FilterModelError>,
    pub compute_time_seconds: f64,
}

// ── Computation ───────────────────────────────────────────────────────────────

/// Compute the view named by `request` over `matches`.
pub fn compute_view(matches: &[Match], request: &ViewRequest) -> ViewSnapshot {
    let start = Instant::now();
    let params = &request.params;

    let compiled = FilterEngine::compile(matches.first(), &params.filter);
    let filtered: Cow<'_, [Match]> = if compiled.is_noop() {
        Cow::Borrowed(matches)
    } else {
        Cow::Owned(
            matches
                .iter()
                .filter(|m| compiled.matches(*m))
                .cloned()
                .collect(),
        )
    };

    let summary = FilterEngine::summarize(filtered.iter());

    let data = match request.kind {
        ViewKind::Overview => ViewData::Overview {
            overview: Overview::from_matches(matches),
        },
        ViewKind::Opponents => {
            // Names resolve over the full table, so filter by predicate.
            let stats = AggregationEngine::opponent_stats(matches, |m| compiled.matches(m));
            let stats = AggregationEngine::extreme_exclusion_filter(&stats, params.exclude_extremes);
            ViewData::Opponents {
                most_played: AggregationEngine::top_opponents_by_matches(&stats, params.top),
                opponents: AggregationEngine::sort_opponent_stats(&stats, params.sort, params.ascending),
                most_lost: AggregationEngine::top_opponents_by_rating_delta(
                    matches,
                    |m| compiled.matches(m),
                    params.top,
                    DeltaDirection::Lost,
                ),
                most_gained: AggregationEngine::top_opponents_by_rating_delta(
                    matches,
                    |m| compiled.matches(m),
                    params.top,
                    DeltaDirection::Gained,
                ),
            }
        }
        ViewKind::Rounds => {
            let rounds = AggregationEngine::round_stats(&filtered);
            ViewData::Rounds {
                rounds: AggregationEngine::extreme_exclusion_filter(&rounds, params.exclude_extremes),
            }
        }
        ViewKind::Rating => ViewData::Rating {
            series: AggregationEngine::rating_time_series(&filtered),
        },
    };

    let compute_time_seconds = start.elapsed().as_secs_f64();
    debug!(
        "Computed {} view #{} over {} matches in {:.3}s",
        request.kind.as_str(),
        request.id,
        filtered.len(),
        compute_time_seconds
    );

    ViewSnapshot {
        request_id: request.id,
        kind: request.kind,
        summary,
        data,
        skipped: compiled.skipped,
        compute_time_seconds,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use history_data::analysis::analyze_text;
    use history_data::filter::{ColumnFilter, Condition};

    const EXPORT: &str = "\
Event Name,Event Date,Rated,Round,Opponent,Result,Rating Change
Armory,\"Jan. 1, 2025\",Yes,1,Bob (123),Win,12
Armory,\"Jan. 2, 2025\",Yes,2,Bob (123),Loss,-8
Armory,\"Jan. 2, 2025\",Yes,3,Carl (55),Win,9
Armory,\"Jan. 3, 2025\",Yes,P1,Dana (77),Loss,-15
Armory,\"Jan. 3, 2025\",No,4,BYE,Win,
";

    fn matches() -> Vec<Match> {
        analyze_text(EXPORT).unwrap().matches
    }

    fn request(kind: ViewKind, params: ViewParams) -> ViewRequest {
        ViewRequest { id: 7, kind, params }
    }

    #[test]
    fn test_view_kind_names() {
        for kind in ViewKind::ALL {
            assert_eq!(ViewKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ViewKind::from_name("all"), None);
    }

    #[test]
    fn test_compute_overview() {
        let snapshot = compute_view(&matches(), &request(ViewKind::Overview, ViewParams::default()));
        assert_eq!(snapshot.request_id, 7);
        assert_eq!(snapshot.summary.count, 4);
        match snapshot.data {
            ViewData::Overview { overview } => {
                assert_eq!(overview.byes, 1);
                assert_eq!(overview.final_rating, 1498.0);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn test_compute_opponents() {
        let snapshot = compute_view(&matches(), &request(ViewKind::Opponents, ViewParams::default()));
        let ViewData::Opponents {
            opponents,
            most_played,
            most_lost,
            most_gained,
        } = snapshot.data
        else {
            panic!("expected opponents view");
        };

        assert_eq!(opponents.len(), 3);
        assert_eq!(opponents[0].opponent_name, "Bob");
        assert_eq!(most_played[0].match_count, 2);
        assert_eq!(most_lost[0].opponent_name, "Dana");
        assert_eq!(most_gained[0].opponent_name, "Carl");
    }

    #[test]
    fn test_compute_opponents_excluding_extremes() {
        let params = ViewParams {
            exclude_extremes: true,
            ..ViewParams::default()
        };
        let snapshot = compute_view(&matches(), &request(ViewKind::Opponents, params));
        let ViewData::Opponents { opponents, .. } = snapshot.data else {
            panic!("expected opponents view");
        };
        assert_eq!(opponents.len(), 1);
        assert_eq!(opponents[0].win_rate, Some(0.5));
    }

    #[test]
    fn test_compute_rounds_and_rating() {
        let rows = matches();
        let rounds = compute_view(&rows, &request(ViewKind::Rounds, ViewParams::default()));
        let ViewData::Rounds { rounds } = rounds.data else {
            panic!("expected rounds view");
        };
        let labels: Vec<&str> = rounds.iter().map(|r| r.round.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "3", "P1"]);

        let rating = compute_view(&rows, &request(ViewKind::Rating, ViewParams::default()));
        let ViewData::Rating { series } = rating.data else {
            panic!("expected rating view");
        };
        let values: Vec<f64> = series.iter().map(|p| p.rating).collect();
        assert_eq!(values, vec![1512.0, 1513.0, 1498.0]);
    }

    #[test]
    fn test_compute_with_filter() {
        let params = ViewParams {
            filter: FilterModel::default()
                .with("Opponent", ColumnFilter::Single(Condition::contains("bob")))
                .with("Deck", ColumnFilter::Single(Condition::contains("x"))),
            ..ViewParams::default()
        };
        let snapshot = compute_view(&matches(), &request(ViewKind::Rating, params));

        assert_eq!(snapshot.summary.count, 2);
        assert_eq!(snapshot.summary.unique_opponents, 1);
        assert_eq!(snapshot.skipped.len(), 1);
        let ViewData::Rating { series } = snapshot.data else {
            panic!("expected rating view");
        };
        assert_eq!(series.last().map(|p| p.rating), Some(1504.0));
    }

    #[test]
    fn test_compute_opponents_filtered_names_agree() {
        let rows = analyze_text(
            "\
Event Name,Event Date,Rated,Round,Opponent,Result,Rating Change
Armory A,\"Jan. 1, 2025\",Yes,1,Robert (1),Loss,-10
Skirmish,\"Jan. 8, 2025\",Yes,1,Bob (1),Loss,-4
",
        )
        .unwrap()
        .matches;
        let params = ViewParams {
            filter: FilterModel::default()
                .with("Event Name", ColumnFilter::Single(Condition::contains("a"))),
            ..ViewParams::default()
        };
        let snapshot = compute_view(&rows, &request(ViewKind::Opponents, params));
        let ViewData::Opponents {
            opponents,
            most_lost,
            ..
        } = snapshot.data
        else {
            panic!("expected opponents view");
        };

        assert_eq!(opponents[0].opponent_name, "Bob");
        assert_eq!(most_lost[0].opponent_name, "Bob");
        assert_eq!(most_lost[0].opponent_id, opponents[0].opponent_id);
    }

    #[test]
    fn test_view_data_serializes_with_tag() {
        let snapshot = compute_view(&matches(), &request(ViewKind::Rounds, ViewParams::default()));
        let json = serde_json::to_value(&snapshot.data).unwrap();
        assert_eq!(json["view"], "rounds");
        assert_eq!(json["rounds"][0]["round"], "1");
    }
}

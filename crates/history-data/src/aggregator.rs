//! Statistical views over normalized matches.
//!
//! Every view is a pure function of an immutable `&[Match]` plus its
//! parameters. Bye rows never reach any aggregate.

use std::collections::HashMap;
use std::hash::Hash;

use history_core::data_processors::round_sort_key;
use history_core::models::{
    win_rate, Match, OpponentKey, OpponentStat, RatingDelta, RatingPoint, RoundStat, WinRated,
    BASELINE_RATING, UNKNOWN_OPPONENT,
};
use serde::{Deserialize, Serialize};

// ── MatchGroup ────────────────────────────────────────────────────────────────

/// Tallies for one group of matches sharing a key.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchGroup<K> {
    pub key: K,
    pub match_count: usize,
    pub win_count: usize,
    pub rating_total: f64,
    /// Index into the source slice of the group's first member.
    pub first_index: usize,
    /// Index into the source slice of the group's last member.
    pub last_index: usize,
}

impl<K> MatchGroup<K> {
    fn new(key: K, index: usize) -> Self {
        Self {
            key,
            match_count: 0,
            win_count: 0,
            rating_total: 0.0,
            first_index: index,
            last_index: index,
        }
    }

    fn add(&mut self, index: usize, m: &Match) {
        self.match_count += 1;
        if m.user_win {
            self.win_count += 1;
        }
        self.rating_total += m.rating_change;
        self.last_index = index;
    }

    /// Every non-win counts as a loss.
    pub fn loss_count(&self) -> usize {
        self.match_count - self.win_count
    }

    pub fn win_rate(&self) -> Option<f64> {
        win_rate(self.win_count, self.match_count)
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

/// Which end of the rating-delta ranking to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaDirection {
    /// Most rating lost (smallest sums first).
    Lost,
    /// Most rating gained (largest sums first).
    Gained,
}

/// Sort column for the opponent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpponentSort {
    Name,
    WinRate,
    Matches,
}

impl OpponentSort {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "win-rate" => Some(Self::WinRate),
            "matches" => Some(Self::Matches),
            _ => None,
        }
    }
}

// ── AggregationEngine ─────────────────────────────────────────────────────────

/// Stateless builder of grouped views over a match table.
pub struct AggregationEngine;

impl AggregationEngine {
    /// Group the non-bye matches accepted by `include` by `key_fn`.
    ///
    /// Groups come back in order of first appearance.
    pub fn group_matches<K, I, F>(matches: &[Match], include: I, key_fn: F) -> Vec<MatchGroup<K>>
    where
        K: Eq + Hash + Clone,
        I: Fn(&Match) -> bool,
        F: Fn(&Match) -> K,
    {
        let mut slots: HashMap<K, usize> = HashMap::new();
        let mut groups: Vec<MatchGroup<K>> = Vec::new();

        for (index, m) in matches.iter().enumerate() {
            if m.is_bye || !include(m) {
                continue;
            }
            let key = key_fn(m);
            let slot = *slots.entry(key.clone()).or_insert_with(|| {
                groups.push(MatchGroup::new(key, index));
                groups.len() - 1
            });
            groups[slot].add(index, m);
        }

        groups
    }

    /// Head-to-head records per opponent ID for matches passing `predicate`.
    ///
    /// Matches without an ID share one group named [`UNKNOWN_OPPONENT`].
    /// The name shown for an ID is the one on its last row in file order,
    /// looked up over the whole table so filtering never changes it.
    pub fn opponent_stats<P>(matches: &[Match], predicate: P) -> Vec<OpponentStat>
    where
        P: Fn(&Match) -> bool,
    {
        let names = Self::representative_names(matches);

        Self::group_matches(matches, predicate, Match::opponent_key)
            .into_iter()
            .map(|group| OpponentStat {
                opponent_id: group.key.id().map(str::to_string),
                opponent_name: Self::resolve_name(&names, &group.key),
                match_count: group.match_count,
                win_count: group.win_count,
                loss_count: group.loss_count(),
                win_rate: group.win_rate(),
            })
            .collect()
    }

    /// Win rate per round label, Swiss rounds first by number, then playoff
    /// rounds by number, then any other label. Equal keys keep encounter
    /// order.
    pub fn round_stats(matches: &[Match]) -> Vec<RoundStat> {
        let mut stats: Vec<RoundStat> = Self::group_matches(matches, |_| true, |m| m.round.clone())
            .into_iter()
            .map(|group| RoundStat {
                sort_key: round_sort_key(&group.key),
                match_count: group.match_count,
                win_count: group.win_count,
                win_rate: group.win_rate(),
                round: group.key,
            })
            .collect();

        stats.sort_by_key(|s| s.sort_key);
        stats
    }

    /// Cumulative rating from [`BASELINE_RATING`], one point per calendar
    /// day holding the last value reached that day. Only rated matches
    /// contribute; same-timestamp matches keep file order.
    pub fn rating_time_series(matches: &[Match]) -> Vec<RatingPoint> {
        let mut rated: Vec<&Match> = matches.iter().filter(|m| m.is_rated() && !m.is_bye).collect();
        rated.sort_by_key(|m| m.event_date);

        let mut points: Vec<RatingPoint> = Vec::new();
        let mut rating = BASELINE_RATING;

        for m in rated {
            rating += m.rating_change;
            let date = m.event_date.date();
            match points.last_mut() {
                Some(last) if last.date == date => last.rating = rating,
                _ => points.push(RatingPoint { date, rating }),
            }
        }

        points
    }

    /// The `n` opponents with the most rating lost or gained over rated
    /// matches passing `predicate`. Ties keep first-seen order. Names
    /// resolve over the whole table, as in [`Self::opponent_stats`].
    pub fn top_opponents_by_rating_delta<P>(
        matches: &[Match],
        predicate: P,
        n: usize,
        direction: DeltaDirection,
    ) -> Vec<RatingDelta>
    where
        P: Fn(&Match) -> bool,
    {
        let names = Self::representative_names(matches);

        let mut groups =
            Self::group_matches(matches, |m| m.is_rated() && predicate(m), Match::opponent_key);
        match direction {
            DeltaDirection::Lost => groups.sort_by(|a, b| a.rating_total.total_cmp(&b.rating_total)),
            DeltaDirection::Gained => {
                groups.sort_by(|a, b| b.rating_total.total_cmp(&a.rating_total))
            }
        }

        groups
            .into_iter()
            .take(n)
            .map(|group| RatingDelta {
                opponent_id: group.key.id().map(str::to_string),
                opponent_name: Self::resolve_name(&names, &group.key),
                total_change: group.rating_total,
                match_count: group.match_count,
            })
            .collect()
    }

    /// The `n` most-played opponents. Ties keep their input order.
    pub fn top_opponents_by_matches(stats: &[OpponentStat], n: usize) -> Vec<OpponentStat> {
        let mut sorted = stats.to_vec();
        sorted.sort_by(|a, b| b.match_count.cmp(&a.match_count));
        sorted.truncate(n);
        sorted
    }

    /// Stable sort of an opponent table. Undefined win rates sort lowest;
    /// names compare case-insensitively.
    pub fn sort_opponent_stats(
        stats: &[OpponentStat],
        key: OpponentSort,
        ascending: bool,
    ) -> Vec<OpponentStat> {
        let mut sorted = stats.to_vec();
        sorted.sort_by(|a, b| {
            let ord = match key {
                OpponentSort::Name => a
                    .opponent_name
                    .to_lowercase()
                    .cmp(&b.opponent_name.to_lowercase()),
                OpponentSort::WinRate => a
                    .win_rate
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&b.win_rate.unwrap_or(f64::NEG_INFINITY)),
                OpponentSort::Matches => a.match_count.cmp(&b.match_count),
            };
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        sorted
    }

    /// Drop entries with an undefined win rate; with `exclude` also drop
    /// entries at exactly 0% or 100%.
    pub fn extreme_exclusion_filter<T>(stats: &[T], exclude: bool) -> Vec<T>
    where
        T: WinRated + Clone,
    {
        stats
            .iter()
            .filter(|s| match s.win_rate() {
                None => false,
                Some(rate) => !exclude || (rate != 0.0 && rate != 1.0),
            })
            .cloned()
            .collect()
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Last-seen name for every opponent ID, scanning in file order.
    fn representative_names(matches: &[Match]) -> HashMap<&str, &str> {
        let mut names = HashMap::new();
        for m in matches.iter().filter(|m| !m.is_bye) {
            if let Some(id) = &m.opponent_id {
                names.insert(id.as_str(), m.opponent_name.as_str());
            }
        }
        names
    }

    fn resolve_name(names: &HashMap<&str, &str>, key: &OpponentKey) -> String {
        key.id()
            .and_then(|id| names.get(id))
            .map(|name| name.to_string())
            .unwrap_or_else(|| UNKNOWN_OPPONENT.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use history_core::models::{Rated, RoundTier};

    fn make_match(opponent: &str, round: &str, win: bool, change: f64, date: (i32, u32, u32)) -> Match {
        let parsed = history_core::data_processors::OpponentParser::parse(opponent);
        Match {
            event_name: "Armory".to_string(),
            event_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            rated: Rated::Yes,
            round: round.to_string(),
            opponent_raw: opponent.to_string(),
            opponent_id: parsed.id,
            opponent_name: parsed.name,
            result: if win { "Win" } else { "Loss" }.to_string(),
            user_win: win,
            rating_change: change,
            is_bye: history_core::data_processors::OpponentParser::is_bye(opponent),
        }
    }

    fn at(opponent: &str, win: bool) -> Match {
        make_match(opponent, "1", win, 0.0, (2025, 1, 1))
    }

    // ── group_matches ─────────────────────────────────────────────────────────

    #[test]
    fn test_group_matches_first_seen_order_and_indices() {
        let matches = vec![at("B (2)", true), at("A (1)", false), at("B (2)", false)];
        let groups = AggregationEngine::group_matches(&matches, |_| true, Match::opponent_key);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, OpponentKey::Id("2".to_string()));
        assert_eq!(groups[0].first_index, 0);
        assert_eq!(groups[0].last_index, 2);
        assert_eq!(groups[0].win_count, 1);
        assert_eq!(groups[0].loss_count(), 1);
        assert_eq!(groups[1].key, OpponentKey::Id("1".to_string()));
    }

    #[test]
    fn test_group_matches_skips_byes() {
        let matches = vec![at("BYE", true), at("A (1)", true)];
        let groups = AggregationEngine::group_matches(&matches, |_| true, |m| m.round.clone());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].match_count, 1);
    }

    // ── opponent_stats ────────────────────────────────────────────────────────

    #[test]
    fn test_opponent_stats_counts() {
        let matches = vec![
            at("Bob (123)", true),
            at("Bob (123)", false),
            at("Al (9)", false),
        ];
        let stats = AggregationEngine::opponent_stats(&matches, |_| true);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].opponent_id.as_deref(), Some("123"));
        assert_eq!(stats[0].opponent_name, "Bob");
        assert_eq!(stats[0].match_count, 2);
        assert_eq!(stats[0].win_rate, Some(0.5));
        for s in &stats {
            assert_eq!(s.win_count + s.loss_count, s.match_count);
        }
    }

    #[test]
    fn test_opponent_stats_last_name_wins() {
        let matches = vec![
            at("Robert (123)", true),
            at("Bobby (123)", true),
            at("Bob (123)", false),
        ];
        let stats = AggregationEngine::opponent_stats(&matches, |_| true);
        assert_eq!(stats[0].opponent_name, "Bob");
    }

    #[test]
    fn test_opponent_stats_name_ignores_predicate() {
        let matches = vec![at("Robert (123)", true), at("Bob (123)", false)];
        let stats = AggregationEngine::opponent_stats(&matches, |m| m.user_win);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].match_count, 1);
        assert_eq!(stats[0].opponent_name, "Bob");
    }

    #[test]
    fn test_opponent_stats_unknown_bucket() {
        let matches = vec![at("Alice", true), at("Carol", false), at("Bob (1)", true)];
        let stats = AggregationEngine::opponent_stats(&matches, |_| true);

        assert_eq!(stats.len(), 2);
        assert!(stats[0].opponent_id.is_none());
        assert_eq!(stats[0].opponent_name, UNKNOWN_OPPONENT);
        assert_eq!(stats[0].match_count, 2);
    }

    #[test]
    fn test_opponent_stats_excludes_byes() {
        let matches = vec![at("BYE", true), at("Bye (0)", true)];
        assert!(AggregationEngine::opponent_stats(&matches, |_| true).is_empty());
    }

    // ── round_stats ───────────────────────────────────────────────────────────

    #[test]
    fn test_round_stats_ordering() {
        let matches: Vec<Match> = ["3", "1", "P2", "2", "P1"]
            .iter()
            .map(|r| make_match("A (1)", r, true, 0.0, (2025, 1, 1)))
            .collect();
        let rounds: Vec<String> = AggregationEngine::round_stats(&matches)
            .into_iter()
            .map(|s| s.round)
            .collect();
        assert_eq!(rounds, vec!["1", "2", "3", "P1", "P2"]);
    }

    #[test]
    fn test_round_stats_numeric_not_lexicographic() {
        let matches: Vec<Match> = ["10", "9", "P10", "Top 8", "P9", "Finals"]
            .iter()
            .map(|r| make_match("A (1)", r, false, 0.0, (2025, 1, 1)))
            .collect();
        let stats = AggregationEngine::round_stats(&matches);
        let rounds: Vec<&str> = stats.iter().map(|s| s.round.as_str()).collect();
        assert_eq!(rounds, vec!["9", "10", "P9", "P10", "Top 8", "Finals"]);
        assert_eq!(stats[4].sort_key.tier, RoundTier::Other);
    }

    #[test]
    fn test_round_stats_win_rate_and_byes() {
        let matches = vec![
            make_match("A (1)", "1", true, 0.0, (2025, 1, 1)),
            make_match("B (2)", "1", false, 0.0, (2025, 1, 2)),
            make_match("BYE", "2", true, 0.0, (2025, 1, 1)),
        ];
        let stats = AggregationEngine::round_stats(&matches);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].round, "1");
        assert_eq!(stats[0].win_rate, Some(0.5));
    }

    // ── rating_time_series ────────────────────────────────────────────────────

    #[test]
    fn test_rating_time_series_running_sum() {
        let matches = vec![
            make_match("Bob (123)", "1", true, 12.0, (2025, 1, 1)),
            make_match("Bob (123)", "2", false, -8.0, (2025, 1, 2)),
        ];
        let series = AggregationEngine::rating_time_series(&matches);
        assert_eq!(
            series,
            vec![
                RatingPoint {
                    date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    rating: 1512.0
                },
                RatingPoint {
                    date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                    rating: 1504.0
                },
            ]
        );
    }

    #[test]
    fn test_rating_time_series_collapses_days_and_sorts() {
        let matches = vec![
            make_match("A (1)", "1", true, 5.0, (2025, 2, 1)),
            make_match("A (1)", "1", true, 10.0, (2025, 1, 1)),
            make_match("B (2)", "2", false, -3.0, (2025, 1, 1)),
        ];
        let series = AggregationEngine::rating_time_series(&matches);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].rating, 1507.0);
        assert_eq!(series[1].rating, 1512.0);
    }

    #[test]
    fn test_rating_time_series_only_rated() {
        let mut unrated = make_match("A (1)", "1", true, 40.0, (2025, 1, 1));
        unrated.rated = Rated::No;
        let mut unknown = make_match("A (1)", "1", true, 40.0, (2025, 1, 1));
        unknown.rated = Rated::Unknown;
        let rated = make_match("B (2)", "1", true, 7.0, (2025, 1, 3));

        let series = AggregationEngine::rating_time_series(&[unrated, unknown, rated]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].rating, 1507.0);
    }

    #[test]
    fn test_rating_time_series_final_value_matches_total() {
        let matches = vec![
            make_match("A (1)", "1", true, 11.5, (2024, 12, 30)),
            make_match("B (2)", "2", false, -4.0, (2025, 1, 4)),
            make_match("C (3)", "3", true, 9.0, (2025, 1, 4)),
        ];
        let total: f64 = matches.iter().filter(|m| m.is_rated()).map(|m| m.rating_change).sum();
        let series = AggregationEngine::rating_time_series(&matches);
        assert_eq!(series.last().unwrap().rating, BASELINE_RATING + total);
    }

    #[test]
    fn test_rating_time_series_empty() {
        assert!(AggregationEngine::rating_time_series(&[]).is_empty());
    }

    // ── top_opponents_by_rating_delta ─────────────────────────────────────────

    #[test]
    fn test_top_opponents_by_rating_delta() {
        let matches = vec![
            make_match("A (1)", "1", false, -10.0, (2025, 1, 1)),
            make_match("B (2)", "1", true, 15.0, (2025, 1, 1)),
            make_match("C (3)", "1", false, -10.0, (2025, 1, 1)),
            make_match("A (1)", "2", false, -5.0, (2025, 1, 2)),
            make_match("D (4)", "1", true, 3.0, (2025, 1, 1)),
        ];

        let lost = AggregationEngine::top_opponents_by_rating_delta(&matches, |_| true, 2, DeltaDirection::Lost);
        assert_eq!(lost.len(), 2);
        assert_eq!(lost[0].opponent_id.as_deref(), Some("1"));
        assert_eq!(lost[0].total_change, -15.0);
        assert_eq!(lost[0].match_count, 2);
        assert_eq!(lost[1].opponent_id.as_deref(), Some("3"));

        let gained =
            AggregationEngine::top_opponents_by_rating_delta(&matches, |_| true, 2, DeltaDirection::Gained);
        assert_eq!(gained[0].opponent_name, "B");
        assert_eq!(gained[1].opponent_name, "D");
    }

    #[test]
    fn test_top_opponents_by_rating_delta_ties_keep_first_seen() {
        let matches = vec![
            make_match("X (7)", "1", false, -6.0, (2025, 1, 1)),
            make_match("Y (8)", "1", false, -6.0, (2025, 1, 1)),
        ];
        for direction in [DeltaDirection::Lost, DeltaDirection::Gained] {
            let ranked = AggregationEngine::top_opponents_by_rating_delta(&matches, |_| true, 5, direction);
            assert_eq!(ranked[0].opponent_name, "X");
            assert_eq!(ranked[1].opponent_name, "Y");
        }
    }

    #[test]
    fn test_top_opponents_by_rating_delta_name_ignores_predicate() {
        let mut first = make_match("Robert (1)", "1", false, -10.0, (2025, 1, 1));
        first.event_name = "Armory A".to_string();
        let mut second = make_match("Bob (1)", "1", false, -4.0, (2025, 1, 8));
        second.event_name = "Skirmish".to_string();
        let matches = vec![first, second];

        let ranked = AggregationEngine::top_opponents_by_rating_delta(
            &matches,
            |m| m.event_name.contains('A'),
            3,
            DeltaDirection::Lost,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].total_change, -10.0);
        assert_eq!(ranked[0].opponent_name, "Bob");
    }

    #[test]
    fn test_top_opponents_by_rating_delta_ignores_unrated() {
        let mut unrated = make_match("A (1)", "1", false, -50.0, (2025, 1, 1));
        unrated.rated = Rated::No;
        let ranked = AggregationEngine::top_opponents_by_rating_delta(&[unrated], |_| true, 3, DeltaDirection::Lost);
        assert!(ranked.is_empty());
    }

    // ── top_opponents_by_matches / sort_opponent_stats ────────────────────────

    #[test]
    fn test_top_opponents_by_matches() {
        let matches = vec![
            at("A (1)", true),
            at("B (2)", true),
            at("B (2)", false),
            at("C (3)", true),
            at("C (3)", true),
        ];
        let stats = AggregationEngine::opponent_stats(&matches, |_| true);
        let top = AggregationEngine::top_opponents_by_matches(&stats, 2);
        let names: Vec<&str> = top.iter().map(|s| s.opponent_name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn test_sort_opponent_stats() {
        let matches = vec![
            at("carol (3)", true),
            at("Alice (1)", false),
            at("Bob (2)", true),
            at("Bob (2)", false),
        ];
        let stats = AggregationEngine::opponent_stats(&matches, |_| true);

        let by_name = AggregationEngine::sort_opponent_stats(&stats, OpponentSort::Name, true);
        let names: Vec<&str> = by_name.iter().map(|s| s.opponent_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "carol"]);

        let by_rate = AggregationEngine::sort_opponent_stats(&stats, OpponentSort::WinRate, false);
        let names: Vec<&str> = by_rate.iter().map(|s| s.opponent_name.as_str()).collect();
        assert_eq!(names, vec!["carol", "Bob", "Alice"]);
    }

    #[test]
    fn test_opponent_sort_from_name() {
        assert_eq!(OpponentSort::from_name("win-rate"), Some(OpponentSort::WinRate));
        assert_eq!(OpponentSort::from_name("elo"), None);
    }

    // ── extreme_exclusion_filter ──────────────────────────────────────────────

    fn stat(wins: usize, total: usize) -> OpponentStat {
        OpponentStat {
            opponent_id: Some(format!("{wins}/{total}")),
            opponent_name: "x".to_string(),
            match_count: total,
            win_count: wins,
            loss_count: total - wins,
            win_rate: win_rate(wins, total),
        }
    }

    #[test]
    fn test_extreme_exclusion_filter_enabled() {
        let stats = vec![stat(0, 5), stat(3, 5), stat(5, 5)];
        let kept = AggregationEngine::extreme_exclusion_filter(&stats, true);
        assert_eq!(kept, vec![stat(3, 5)]);
    }

    #[test]
    fn test_extreme_exclusion_filter_disabled_keeps_defined() {
        let stats = vec![stat(0, 5), stat(3, 5), stat(5, 5), stat(0, 0)];
        let kept = AggregationEngine::extreme_exclusion_filter(&stats, false);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|s| s.match_count > 0));
    }

    #[test]
    fn test_extreme_exclusion_filter_on_rounds() {
        let matches = vec![
            make_match("A (1)", "1", true, 0.0, (2025, 1, 1)),
            make_match("A (1)", "2", true, 0.0, (2025, 1, 1)),
            make_match("B (2)", "2", false, 0.0, (2025, 1, 1)),
        ];
        let rounds = AggregationEngine::round_stats(&matches);
        let kept = AggregationEngine::extreme_exclusion_filter(&rounds, true);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].round, "2");
    }
}

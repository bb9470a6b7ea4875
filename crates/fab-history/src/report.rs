//! Plain-text and JSON rendering of view snapshots.

use std::fmt::Write as _;

use history_core::formatting::{format_number, format_rating_change, format_win_rate};
use history_core::models::{Meta, OpponentStat, RatingDelta, Summary};
use history_data::analysis::AnalysisMetadata;
use history_runtime::views::{ViewData, ViewSnapshot};
use serde_json::{json, Value};

// ── Text ──────────────────────────────────────────────────────────────────────

/// Render the export header and every snapshot as a plain-text report.
pub fn render_text(meta: &Meta, snapshots: &[ViewSnapshot]) -> String {
    let mut out = String::new();

    if !meta.is_empty() {
        for (key, value) in meta.iter() {
            let _ = writeln!(out, "{key}: {value}");
        }
        out.push('\n');
    }

    for snapshot in snapshots {
        let _ = writeln!(out, "== {} ==", title(&snapshot.data));
        for skipped in &snapshot.skipped {
            let _ = writeln!(out, "(filter skipped: {skipped})");
        }
        write_summary(&mut out, &snapshot.summary);
        write_view(&mut out, &snapshot.data);
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn title(data: &ViewData) -> &'static str {
    match data {
        ViewData::Overview { .. } => "Overview",
        ViewData::Opponents { .. } => "Opponents",
        ViewData::Rounds { .. } => "Rounds",
        ViewData::Rating { .. } => "Rating",
    }
}

fn write_summary(out: &mut String, summary: &Summary) {
    let _ = writeln!(
        out,
        "{} matches, {} wins, win rate {}, {} opponents, net rating {}",
        summary.count,
        summary.wins,
        format_win_rate(Some(summary.win_rate)),
        summary.unique_opponents,
        format_rating_change(summary.net_rating_change),
    );
}

fn write_view(out: &mut String, data: &ViewData) {
    match data {
        ViewData::Overview { overview } => {
            let _ = writeln!(
                out,
                "Overall: {}-{} over {} events ({} byes)",
                overview.wins, overview.losses, overview.events, overview.byes
            );
            let _ = writeln!(
                out,
                "Rating: {} ({})",
                format_number(overview.final_rating, 0),
                format_rating_change(overview.net_rating_change)
            );
            if let (Some(first), Some(last)) = (overview.first_match, overview.last_match) {
                let _ = writeln!(out, "Played: {first} to {last}");
            }
        }
        ViewData::Opponents {
            opponents,
            most_played,
            most_lost,
            most_gained,
        } => {
            write_opponent_table(out, opponents);
            let _ = writeln!(out, "\nMost played:");
            for s in most_played {
                let _ = writeln!(out, "  {:<24} {}", s.opponent_name, s.match_count);
            }
            write_deltas(out, "Most rating lost", most_lost);
            write_deltas(out, "Most rating gained", most_gained);
        }
        ViewData::Rounds { rounds } => {
            let _ = writeln!(out, "{:<10} {:>7} {:>5} {:>8}", "Round", "Matches", "Wins", "Win %");
            for r in rounds {
                let _ = writeln!(
                    out,
                    "{:<10} {:>7} {:>5} {:>8}",
                    r.round,
                    r.match_count,
                    r.win_count,
                    format_win_rate(r.win_rate)
                );
            }
        }
        ViewData::Rating { series } => {
            for point in series {
                let _ = writeln!(out, "{}  {}", point.date, format_number(point.rating, 0));
            }
        }
    }
}

fn write_opponent_table(out: &mut String, opponents: &[OpponentStat]) {
    let _ = writeln!(
        out,
        "{:<24} {:>10} {:>7} {:>5} {:>6} {:>8}",
        "Opponent", "GEM ID", "Matches", "Wins", "Losses", "Win %"
    );
    for s in opponents {
        let _ = writeln!(
            out,
            "{:<24} {:>10} {:>7} {:>5} {:>6} {:>8}",
            s.opponent_name,
            s.opponent_id.as_deref().unwrap_or("-"),
            s.match_count,
            s.win_count,
            s.loss_count,
            format_win_rate(s.win_rate)
        );
    }
}

fn write_deltas(out: &mut String, heading: &str, deltas: &[RatingDelta]) {
    let _ = writeln!(out, "\n{heading}:");
    for d in deltas {
        let _ = writeln!(
            out,
            "  {:<24} {:>6} over {} matches",
            d.opponent_name,
            format_rating_change(d.total_change),
            d.match_count
        );
    }
}

// ── JSON ──────────────────────────────────────────────────────────────────────

/// Render the report as one JSON document.
pub fn render_json(
    meta: &Meta,
    metadata: &AnalysisMetadata,
    snapshots: &[ViewSnapshot],
) -> anyhow::Result<String> {
    let views: Vec<Value> = snapshots
        .iter()
        .map(|s| -> Result<Value, serde_json::Error> {
            Ok(json!({
                "summary": serde_json::to_value(&s.summary)?,
                "data": serde_json::to_value(&s.data)?,
                "skipped_filters": s.skipped.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            }))
        })
        .collect::<Result<_, _>>()?;

    let meta: serde_json::Map<String, Value> = meta
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();

    let document = json!({
        "meta": meta,
        "metadata": serde_json::to_value(metadata)?,
        "views": views,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use history_data::analysis::analyze_text;
    use history_runtime::views::{compute_view, ViewKind, ViewParams, ViewRequest};

    const EXPORT: &str = "\
# Player Name: Jane Doe
Event Name,Event Date,Rated,Round,Opponent,Result,Rating Change
Armory,\"Jan. 1, 2025\",Yes,1,Bob (123),Win,12
Armory,\"Jan. 2, 2025\",Yes,2,Bob (123),Loss,-8
";

    fn snapshots() -> (Meta, AnalysisMetadata, Vec<ViewSnapshot>) {
        let analysis = analyze_text(EXPORT).unwrap();
        let snapshots = ViewKind::ALL
            .into_iter()
            .enumerate()
            .map(|(id, kind)| {
                compute_view(
                    &analysis.matches,
                    &ViewRequest {
                        id: id as u64,
                        kind,
                        params: ViewParams::default(),
                    },
                )
            })
            .collect();
        (analysis.meta, analysis.metadata, snapshots)
    }

    #[test]
    fn test_render_text_sections() {
        let (meta, _, snapshots) = snapshots();
        let text = render_text(&meta, &snapshots);

        assert!(text.starts_with("Player Name: Jane Doe"));
        for heading in ["== Overview ==", "== Opponents ==", "== Rounds ==", "== Rating =="] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert!(text.contains("2 matches, 1 wins, win rate 50.0%, 1 opponents, net rating +4"));
        assert!(text.contains("Rating: 1,504 (+4)"));
        assert!(text.contains("2025-01-02  1,504"));
    }

    #[test]
    fn test_render_json_document() {
        let (meta, metadata, snapshots) = snapshots();
        let json: Value = serde_json::from_str(&render_json(&meta, &metadata, &snapshots).unwrap()).unwrap();

        assert_eq!(json["meta"]["Player Name"], "Jane Doe");
        assert_eq!(json["metadata"]["rows_loaded"], 2);
        assert_eq!(json["views"].as_array().unwrap().len(), 4);
        assert_eq!(json["views"][1]["data"]["view"], "opponents");
        assert_eq!(json["views"][1]["data"]["opponents"][0]["opponent_id"], "123");
        assert_eq!(json["views"][3]["data"]["series"][0]["rating"], 1512.0);
    }

    #[test]
    fn test_render_text_without_meta() {
        let text = render_text(&Meta::default(), &[]);
        assert!(text.is_empty());
    }
}

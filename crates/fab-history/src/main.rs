mod bootstrap;
mod report;

use anyhow::{Context, Result};
use history_core::settings::Settings;
use history_data::aggregator::OpponentSort;
use history_data::analysis::{analyze_history, HistoryAnalysis};
use history_runtime::orchestrator::ViewOrchestrator;
use history_runtime::views::{ViewKind, ViewParams, ViewRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("FaB History v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Sort: {}, Format: {}",
        settings.view,
        settings.sort,
        settings.format
    );

    let path = bootstrap::discover_history_file(settings.file.as_deref()).with_context(|| {
        format!(
            "No match history export found; pass a path or place {} in the current directory or ~/Downloads",
            bootstrap::EXPORT_FILE_NAME
        )
    })?;
    tracing::info!("Loading {}", path.display());

    let HistoryAnalysis {
        meta,
        matches,
        metadata,
        ..
    } = analyze_history(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    tracing::info!(
        "Loaded {} rows ({} byes) in {:.3}s",
        metadata.rows_loaded,
        metadata.byes_skipped,
        metadata.load_time_seconds + metadata.normalize_time_seconds
    );

    let params = ViewParams {
        filter: bootstrap::load_filter_model(
            settings.filter.as_deref(),
            settings.filter_file.as_deref(),
        )?,
        exclude_extremes: settings.exclude_extremes,
        top: settings.top as usize,
        sort: OpponentSort::from_name(&settings.sort).unwrap_or(OpponentSort::Matches),
        ascending: !settings.descending,
    };

    let kinds: Vec<ViewKind> = if settings.view == "all" {
        ViewKind::ALL.to_vec()
    } else {
        let kind = ViewKind::from_name(&settings.view)
            .with_context(|| format!("Unknown view: {}", settings.view))?;
        vec![kind]
    };

    let (mut client, handle) = ViewOrchestrator::new(matches).start();

    // One request at a time: a newer request would supersede the previous.
    let mut snapshots = Vec::with_capacity(kinds.len());
    for (id, kind) in kinds.into_iter().enumerate() {
        let request = ViewRequest {
            id: id as u64,
            kind,
            params: params.clone(),
        };
        let snapshot = client
            .request(request)
            .await
            .context("View orchestrator stopped before answering")?;
        snapshots.push(snapshot);
    }
    handle.abort();

    let output = match settings.format.as_str() {
        "json" => report::render_json(&meta, &metadata, &snapshots)?,
        _ => report::render_text(&meta, &snapshots),
    };
    println!("{output}");

    Ok(())
}

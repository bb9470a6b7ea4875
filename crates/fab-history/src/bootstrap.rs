use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use history_data::filter::FilterModel;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name GEM gives the match-history export.
pub const EXPORT_FILE_NAME: &str = "match_history.csv";

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.fab-history/` and `~/.fab-history/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    ensure_directories_in(&home)
}

pub fn ensure_directories_in(base: &Path) -> anyhow::Result<()> {
    let app_dir = base.join(".fab-history");
    std::fs::create_dir_all(app_dir.join("logs"))
        .with_context(|| format!("Failed to create {}", app_dir.display()))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `DEBUG`/`INFO`/`WARNING`/`ERROR` level name to a tracing directive.
/// Unrecognised names pass through unchanged.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" | "CRITICAL" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr so stdout carries only the report. With `log_file`
/// set, the same events are appended to that file without ANSI colours.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

// ── Input discovery ────────────────────────────────────────────────────────────

/// Locate the export to analyse.
///
/// An explicit path is returned as-is. Otherwise `match_history.csv` is
/// looked up in the current directory, then in `~/Downloads`.
pub fn discover_history_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let cwd = std::env::current_dir().ok();
    discover_history_file_in(cwd.as_deref(), dirs::download_dir().as_deref())
}

pub fn discover_history_file_in(cwd: Option<&Path>, downloads: Option<&Path>) -> Option<PathBuf> {
    [cwd, downloads]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(EXPORT_FILE_NAME))
        .find(|p| p.is_file())
}

// ── Filter model ───────────────────────────────────────────────────────────────

/// Build the filter model from `--filter` JSON or a `--filter-file`.
/// No filter yields an empty model.
pub fn load_filter_model(inline: Option<&str>, file: Option<&Path>) -> anyhow::Result<FilterModel> {
    if let Some(json) = inline {
        return Ok(FilterModel::from_json(json)?);
    }
    if let Some(path) = file {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file {}", path.display()))?;
        return FilterModel::from_json(&json)
            .with_context(|| format!("Invalid filter file {}", path.display()));
    }
    Ok(FilterModel::default())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while loading a match-history export.
///
/// Every variant aborts the load; there is no partial-load mode.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The export file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV body could not be tokenized.
    #[error("Failed to parse CSV body at line {}: {reason}", display_line(.line))]
    Ingestion { line: Option<usize>, reason: String },

    /// A column the normalizer depends on is absent from the header row.
    #[error("Missing required column \"{column}\"")]
    Schema { column: String },

    /// An event date matched neither the strict nor the lenient formats.
    #[error("Unparseable event date \"{value}\" in row {row} (line {line})")]
    DateParse {
        row: usize,
        line: usize,
        value: String,
    },

    /// A filter model document is not valid JSON for the expected shape.
    #[error("Failed to parse filter model: {0}")]
    FilterModelParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_line(line: &Option<usize>) -> String {
    line.map_or_else(|| "?".to_string(), |l| l.to_string())
}

/// Convenience alias used throughout the history crates.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Non-fatal problems with a client-supplied filter model.
///
/// The offending column's predicate is skipped and the rest of the
/// filter still applies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterModelError {
    #[error("Unknown filter column \"{0}\"")]
    UnknownColumn(String),

    #[error("Unsupported filter mode \"{mode}\" on column \"{column}\"")]
    UnsupportedMode { column: String, mode: String },

    #[error("Compound filter on column \"{0}\" has no conditions")]
    EmptyCompound(String),
}

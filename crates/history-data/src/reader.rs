//! CSV ingestion for GEM match-history exports.
//!
//! Splits an export into its `# key: value` metadata header and the CSV
//! body, then tokenizes the body into a [`RawTable`].

use std::path::Path;

use history_core::error::{HistoryError, Result};
use history_core::models::{Meta, RawRow, RawTable};
use tracing::debug;

const BOM: char = '\u{feff}';

// ── Public API ────────────────────────────────────────────────────────────────

/// Read an export from disk and parse it with [`parse`].
pub fn load_file(path: &Path) -> Result<(Meta, RawTable)> {
    let bytes = std::fs::read(path).map_err(|source| HistoryError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|e| HistoryError::Ingestion {
        line: None,
        reason: format!("{} is not valid UTF-8: {}", path.display(), e),
    })?;
    parse(&text)
}

/// Parse raw export text into its metadata and raw row table.
///
/// * A leading byte-order mark is stripped.
/// * `#` lines containing `:` become [`Meta`] entries; `#` lines without
///   `:` are ignored.
/// * Blank lines are dropped.
/// * Every other line belongs to the CSV body: the first is the header,
///   the rest are data rows. Commas inside double-quoted fields do not
///   split the field.
pub fn parse(text: &str) -> Result<(Meta, RawTable)> {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let mut meta = Meta::default();
    let mut body = String::new();
    // Physical line number of every body line, indexed by body line.
    let mut body_lines: Vec<usize> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            match rest.split_once(':') {
                Some((key, value)) => meta.insert(key.trim(), value.trim()),
                None => debug!("Ignoring metadata line {} without ':'", line_no),
            }
            continue;
        }
        if line.matches('"').count() % 2 != 0 {
            return Err(HistoryError::Ingestion {
                line: Some(line_no),
                reason: "unbalanced quotes".to_string(),
            });
        }
        body.push_str(line);
        body.push('\n');
        body_lines.push(line_no);
    }

    let table = parse_body(&body, &body_lines)?;

    debug!(
        "Parsed {} metadata entries, {} columns, {} rows",
        meta.len(),
        table.headers.len(),
        table.rows.len()
    );

    Ok((meta, table))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Tokenize the CSV body. `body_lines[i]` is the source line of body line `i`.
fn parse_body(body: &str, body_lines: &[usize]) -> Result<RawTable> {
    if body.is_empty() {
        return Ok(RawTable::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let source_line = |csv_line: u64| -> Option<usize> {
        // csv positions are 1-based body lines.
        body_lines.get((csv_line as usize).checked_sub(1)?).copied()
    };
    let to_ingestion = |e: csv::Error| HistoryError::Ingestion {
        line: e.position().and_then(|p| source_line(p.line())),
        reason: e.to_string(),
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(to_ingestion)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(to_ingestion)?;
        let line = record
            .position()
            .and_then(|p| source_line(p.line()))
            .unwrap_or_default();

        if record.len() > headers.len() {
            return Err(HistoryError::Ingestion {
                line: Some(line),
                reason: format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    record.len()
                ),
            });
        }

        // Short rows are padded with empty cells.
        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();
        rows.push(RawRow { line, fields });
    }

    Ok(RawTable { headers, rows })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

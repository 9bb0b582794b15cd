//! Event and label file discovery and loading.
//!
//! Reads CSV files (with a header row) or JSONL files (one object per line)
//! into an [`EventTable`]. A directory is scanned recursively and every
//! supported file in it is loaded in path order.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use features_core::error::{FeatureError, Result};
use features_core::table::{Cell, EventTable};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// On-disk encodings the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Jsonl,
}

impl InputFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(InputFormat::Csv),
            "jsonl" | "ndjson" => Some(InputFormat::Jsonl),
            _ => None,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all supported input files under `data_path`, sorted by path.
///
/// A path that names a file is returned as-is regardless of its extension.
pub fn find_input_files(data_path: &Path) -> Vec<PathBuf> {
    if data_path.is_file() {
        return vec![data_path.to_path_buf()];
    }
    if !data_path.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file() && InputFormat::from_path(entry.path()).is_some()
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every input file under `data_path` into a single table.
///
/// Tables from several files are aligned by column name. Fails when no input
/// file is found or any file is malformed.
pub fn load_table(data_path: &Path) -> Result<EventTable> {
    let files = find_input_files(data_path);
    if files.is_empty() {
        return Err(FeatureError::NoInputFiles(data_path.to_path_buf()));
    }

    let mut table = EventTable::default();
    for file in &files {
        table.append(read_file(file)?);
    }

    info!(
        "Loaded {} rows ({} columns) from {} file(s) under {}",
        table.len(),
        table.column_names().len(),
        files.len(),
        data_path.display()
    );
    Ok(table)
}

/// Read one file, picking the parser from its extension. Files with an
/// unrecognised extension are read as CSV.
pub fn read_file(path: &Path) -> Result<EventTable> {
    match InputFormat::from_path(path).unwrap_or(InputFormat::Csv) {
        InputFormat::Csv => read_csv(path),
        InputFormat::Jsonl => read_jsonl(path),
    }
}

/// Read a CSV file with a header row. Empty fields become nulls.
pub fn read_csv(path: &Path) -> Result<EventTable> {
    let file = open(path)?;
    read_csv_from(file, path)
}

/// Read a JSONL file; every non-blank line must be a JSON object.
pub fn read_jsonl(path: &Path) -> Result<EventTable> {
    let file = open(path)?;
    read_jsonl_from(std::io::BufReader::new(file), path)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|source| FeatureError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

fn read_csv_from<R: std::io::Read>(source: R, path: &Path) -> Result<EventTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let mut table = EventTable::new(headers.iter());

    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Cell::from_field).collect())?;
    }

    debug!("File {}: {} CSV rows", path.display(), table.len());
    Ok(table)
}

fn read_jsonl_from<R: BufRead>(source: R, path: &Path) -> Result<EventTable> {
    let mut table = EventTable::default();
    let mut blank = 0u64;

    for line in source.lines() {
        let line = line.map_err(|source| FeatureError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank += 1;
            continue;
        }
        let object: Map<String, Value> = serde_json::from_str(trimmed)?;
        table.push_named_row(object.iter().map(|(k, v)| (k.as_str(), Cell::from_json(v))));
    }

    debug!(
        "File {}: {} JSONL rows, {} blank lines",
        path.display(),
        table.len(),
        blank
    );
    Ok(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

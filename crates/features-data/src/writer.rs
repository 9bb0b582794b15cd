//! Feature table and label matrix writers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use features_core::error::{FeatureError, Result};
use features_core::features::{FeatureRow, FeatureTable};
use features_core::settings::OutputFormat;
use features_core::table::format_number;
use features_core::taxonomy::{LEVEL_GROUP_COLUMN, SESSION_ID_COLUMN};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::labels::LabelMatrix;

/// Write `table` to `path` in the requested format.
pub fn write_features(table: &FeatureTable, path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => write_features_csv(table, path),
        OutputFormat::Jsonl => write_features_jsonl(table, path),
    }
}

/// CSV with header `session_id,level_group,<features...>`.
pub fn write_features_csv(table: &FeatureTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(create(path)?);

    let header = [SESSION_ID_COLUMN, LEVEL_GROUP_COLUMN]
        .into_iter()
        .chain(table.columns.iter().map(String::as_str));
    writer.write_record(header)?;

    for row in &table.rows {
        let record = [row.session_id.to_string(), row.level_group.clone()]
            .into_iter()
            .chain(row.values.iter().map(|v| format_number(*v)));
        writer.write_record(record)?;
    }

    writer.flush().map_err(|source| write_error(path, source))?;
    debug!("Wrote {} feature rows to {}", table.len(), path.display());
    Ok(())
}

/// One JSON object per row, keys in column order.
pub fn write_features_jsonl(table: &FeatureTable, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(create(path)?);
    for row in &table.rows {
        serde_json::to_writer(
            &mut out,
            &RowRecord {
                columns: &table.columns,
                row,
            },
        )?;
        out.write_all(b"\n").map_err(|source| write_error(path, source))?;
    }
    out.flush().map_err(|source| write_error(path, source))?;
    debug!("Wrote {} feature rows to {}", table.len(), path.display());
    Ok(())
}

/// CSV with header `session_id,q1..qN`, one row per session.
pub fn write_labels_csv(matrix: &LabelMatrix, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(create(path)?);

    let mut header = vec![SESSION_ID_COLUMN.to_string()];
    header.extend(matrix.column_names());
    writer.write_record(&header)?;

    for (session_id, values) in matrix.rows() {
        let record = std::iter::once(session_id.to_string())
            .chain(values.iter().map(|v| format_number(*v)));
        writer.write_record(record)?;
    }

    writer.flush().map_err(|source| write_error(path, source))?;
    debug!("Wrote {} label rows to {}", matrix.len(), path.display());
    Ok(())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

struct RowRecord<'a> {
    columns: &'a [String],
    row: &'a FeatureRow,
}

impl Serialize for RowRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len() + 2))?;
        map.serialize_entry(SESSION_ID_COLUMN, &self.row.session_id)?;
        map.serialize_entry(LEVEL_GROUP_COLUMN, &self.row.level_group)?;
        for (name, value) in self.columns.iter().zip(&self.row.values) {
            if value.fract() == 0.0 && value.abs() < 1e15 {
                map.serialize_entry(name, &(*value as i64))?;
            } else {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
    }
    File::create(path).map_err(|source| write_error(path, source))
}

fn write_error(path: &Path, source: std::io::Error) -> FeatureError {
    FeatureError::FileWrite {
        path: path.to_path_buf(),
        source,
    }
}

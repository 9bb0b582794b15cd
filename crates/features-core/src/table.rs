//! Raw event table as supplied by a data source.
//!
//! Cells are kept untyped until the aggregator coerces the columns it needs,
//! so a source may carry extra columns the taxonomy never touches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// A single untyped table cell.
///
/// Integers read from JSON keep their exact value in [`Cell::Integer`];
/// 17-digit session ids do not survive a trip through `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Cell {
    /// Map a CSV field to a cell; empty fields are nulls.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Null
        } else {
            Cell::Text(field.to_string())
        }
    }

    /// Map a JSON value to a cell. Booleans become 0/1, integers outside the
    /// `i64` range are kept as text and nested values as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Cell::Null,
            serde_json::Value::Bool(b) => Cell::Integer(i64::from(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Integer(i)
                } else if n.is_u64() {
                    Cell::Text(n.to_string())
                } else {
                    n.as_f64().map_or(Cell::Null, Cell::Number)
                }
            }
            serde_json::Value::String(s) if s.is_empty() => Cell::Null,
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Numeric value of the cell.
    ///
    /// `Ok(None)` for nulls (including NaN and textual `nan`), an error
    /// carrying the offending text otherwise.
    pub fn as_number(&self) -> std::result::Result<Option<f64>, String> {
        match self {
            Cell::Null => Ok(None),
            Cell::Integer(i) => Ok(Some(*i as f64)),
            Cell::Number(n) if n.is_nan() => Ok(None),
            Cell::Number(n) => Ok(Some(*n)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_nan() => Ok(None),
                    Ok(v) => Ok(Some(v)),
                    Err(_) => Err(s.clone()),
                }
            }
        }
    }

    /// Categorical label of the cell, `None` for nulls.
    ///
    /// Integers render without a fractional part so that `3` read from JSON
    /// and `"3"` read from CSV compare equal.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Integer(i) => Some(i.to_string()),
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

/// Render a number the way the feature writers do: integral values without a
/// decimal point.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Column-oriented raw event table.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<Cell>>,
    len: usize,
}

impl EventTable {
    /// Create an empty table with the given column names.
    ///
    /// A repeated column name keeps its first position.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for name in names {
            table.add_column(name.into());
        }
        table
    }

    fn add_column(&mut self, name: String) -> usize {
        if let Some(&i) = self.index.get(&name) {
            return i;
        }
        let i = self.names.len();
        self.index.insert(name.clone(), i);
        self.names.push(name);
        self.columns.push(vec![Cell::Null; self.len]);
        i
    }

    /// Append one row whose cells follow the table's column order.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> Result<()> {
        if cells.len() != self.names.len() {
            return Err(FeatureError::RowLength {
                row: self.len,
                expected: self.names.len(),
                found: cells.len(),
            });
        }
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.push(cell);
        }
        self.len += 1;
        Ok(())
    }

    /// Append one row given as `(column, cell)` pairs. Unknown columns are
    /// added (back-filled with nulls); absent columns receive a null.
    pub fn push_named_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (S, Cell)>,
        S: Into<String>,
    {
        let mut row = vec![Cell::Null; self.names.len()];
        for (name, cell) in cells {
            let i = self.add_column(name.into());
            if i >= row.len() {
                row.resize(i + 1, Cell::Null);
            }
            row[i] = cell;
        }
        row.resize(self.names.len(), Cell::Null);
        for (column, cell) in self.columns.iter_mut().zip(row) {
            column.push(cell);
        }
        self.len += 1;
    }

    /// Append every row of `other`, aligning columns by name.
    pub fn append(&mut self, other: EventTable) {
        let EventTable {
            names, columns, len, ..
        } = other;
        let targets: Vec<usize> = names.into_iter().map(|n| self.add_column(n)).collect();
        let mut filled = vec![false; self.names.len()];
        for (target, cells) in targets.into_iter().zip(columns) {
            self.columns[target].extend(cells);
            filled[target] = true;
        }
        for (column, was_filled) in self.columns.iter_mut().zip(filled) {
            if !was_filled {
                column.extend(std::iter::repeat(Cell::Null).take(len));
            }
        }
        self.len += len;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Cells of a column, or `None` when the table has no such column.
    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    /// Cells of a column, failing with [`FeatureError::MissingColumn`].
    pub fn require_column(&self, name: &str) -> Result<&[Cell]> {
        self.column(name)
            .ok_or_else(|| FeatureError::MissingColumn(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_from_field() {
        assert_eq!(Cell::from_field(""), Cell::Null);
        assert_eq!(Cell::from_field("x"), Cell::Text("x".into()));
    }

    #[test]
    fn test_cell_as_number() {
        assert_eq!(Cell::Text(" 12.5 ".into()).as_number(), Ok(Some(12.5)));
        assert_eq!(Cell::Text("NaN".into()).as_number(), Ok(None));
        assert_eq!(Cell::Number(f64::NAN).as_number(), Ok(None));
        assert_eq!(Cell::Null.as_number(), Ok(None));
        assert_eq!(Cell::Text("abc".into()).as_number(), Err("abc".to_string()));
    }

    #[test]
    fn test_cell_as_label_normalises_integers() {
        assert_eq!(Cell::Number(3.0).as_label(), Some("3".to_string()));
        assert_eq!(Cell::Number(2.5).as_label(), Some("2.5".to_string()));
        assert_eq!(Cell::Null.as_label(), None);
    }

    #[test]
    fn test_cell_from_json() {
        use serde_json::json;
        assert_eq!(Cell::from_json(&json!(null)), Cell::Null);
        assert_eq!(Cell::from_json(&json!(4)), Cell::Integer(4));
        assert_eq!(Cell::from_json(&json!(2.5)), Cell::Number(2.5));
        assert_eq!(Cell::from_json(&json!("")), Cell::Null);
        assert_eq!(Cell::from_json(&json!(true)), Cell::Integer(1));
        assert_eq!(Cell::from_json(&json!("a")), Cell::Text("a".into()));
    }

    #[test]
    fn test_cell_from_json_keeps_large_integers_exact() {
        use serde_json::json;
        let id = Cell::from_json(&json!(20090312431273201_i64));
        assert_eq!(id, Cell::Integer(20090312431273201));
        assert_eq!(id.as_label(), Some("20090312431273201".to_string()));

        let huge = Cell::from_json(&json!(18446744073709551615_u64));
        assert_eq!(huge, Cell::Text("18446744073709551615".into()));
    }

    #[test]
    fn test_push_row_checks_length() {
        let mut table = EventTable::new(["a", "b"]);
        table.push_row(vec![Cell::Null, Cell::Number(1.0)]).expect("push");
        let err = table.push_row(vec![Cell::Null]).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::RowLength {
                row: 1,
                expected: 2,
                found: 1
            }
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_push_named_row_adds_columns() {
        let mut table = EventTable::new(["a"]);
        table.push_named_row([("a", Cell::Number(1.0))]);
        table.push_named_row([("b", Cell::Text("x".into()))]);

        assert_eq!(table.column_names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.column("a").unwrap(), &[Cell::Number(1.0), Cell::Null]);
        assert_eq!(table.column("b").unwrap(), &[Cell::Null, Cell::Text("x".into())]);
    }

    #[test]
    fn test_append_aligns_by_name() {
        let mut left = EventTable::new(["a", "b"]);
        left.push_row(vec![Cell::Number(1.0), Cell::Number(2.0)]).unwrap();
        let mut right = EventTable::new(["b", "c"]);
        right.push_row(vec![Cell::Number(3.0), Cell::Number(4.0)]).unwrap();

        left.append(right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.column("a").unwrap(), &[Cell::Number(1.0), Cell::Null]);
        assert_eq!(left.column("b").unwrap(), &[Cell::Number(2.0), Cell::Number(3.0)]);
        assert_eq!(left.column("c").unwrap(), &[Cell::Null, Cell::Number(4.0)]);
    }

    #[test]
    fn test_require_column() {
        let table = EventTable::new(["a"]);
        assert!(table.require_column("a").is_ok());
        assert!(matches!(
            table.require_column("z"),
            Err(FeatureError::MissingColumn(name)) if name == "z"
        ));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(-1.0), "-1");
        assert_eq!(format_number(50.0), "50");
        assert_eq!(format_number(0.25), "0.25");
    }
}

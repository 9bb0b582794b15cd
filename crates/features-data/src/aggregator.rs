//! Per-(session, level group) feature aggregation.
//!
//! One pipeline serves both feature sets: [`FeatureSet::Basic`] emits
//! cardinalities, means and standard deviations; [`FeatureSet::Extended`]
//! additionally emits ranges, medians, event counts, the elapsed-time total
//! and event modes.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use features_core::error::{FeatureError, Result};
use features_core::features::{feature_columns, FeatureRow, FeatureSet, FeatureTable, MISSING_SENTINEL};
use features_core::stats::{count_distinct, indicator_mode, NumericSummary};
use features_core::table::{Cell, EventTable};
use features_core::taxonomy::{Taxonomy, EVENT_NAME_COLUMN, LEVEL_GROUP_COLUMN, SESSION_ID_COLUMN};
use tracing::{debug, warn};

// ── Typed columns ─────────────────────────────────────────────────────────────

/// The taxonomy's columns coerced to the types the statistics need.
struct TypedColumns<'a> {
    session_ids: Vec<Option<i64>>,
    level_groups: Vec<Option<Cow<'a, str>>>,
    /// Index into the taxonomy's event list, `None` for unknown or null names.
    events: Vec<Option<usize>>,
    categorical: Vec<Vec<Option<Cow<'a, str>>>>,
    numerical: Vec<Vec<Option<f64>>>,
    elapsed_time: usize,
}

impl<'a> TypedColumns<'a> {
    /// Resolve every required column first, then coerce; a missing column is
    /// reported before any value is inspected.
    fn from_table(table: &'a EventTable, taxonomy: &Taxonomy) -> Result<Self> {
        for name in taxonomy.required_columns() {
            table.require_column(name)?;
        }

        let session_ids = table
            .require_column(SESSION_ID_COLUMN)?
            .iter()
            .enumerate()
            .map(|(row, cell)| parse_session_id(row, cell))
            .collect::<Result<Vec<_>>>()?;

        let level_groups = table
            .require_column(LEVEL_GROUP_COLUMN)?
            .iter()
            .map(label_of)
            .collect();

        let vocabulary: HashMap<&str, usize> = taxonomy
            .events()
            .iter()
            .enumerate()
            .map(|(i, e)| (e.as_str(), i))
            .collect();
        let events = table
            .require_column(EVENT_NAME_COLUMN)?
            .iter()
            .map(|cell| label_of(cell).and_then(|name| vocabulary.get(&*name).copied()))
            .collect();

        let categorical = taxonomy
            .categorical()
            .iter()
            .map(|name| -> Result<Vec<Option<Cow<'a, str>>>> {
                Ok(table.require_column(name)?.iter().map(label_of).collect())
            })
            .collect::<Result<Vec<_>>>()?;

        let numerical = taxonomy
            .numerical()
            .iter()
            .map(|name| -> Result<Vec<Option<f64>>> {
                coerce_numeric(name, table.require_column(name)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let elapsed_time = taxonomy
            .numerical()
            .iter()
            .position(|n| n == taxonomy.elapsed_time())
            .ok_or_else(|| {
                FeatureError::InvalidTaxonomy(format!(
                    "elapsed time column '{}' is not numerical",
                    taxonomy.elapsed_time()
                ))
            })?;

        Ok(Self {
            session_ids,
            level_groups,
            events,
            categorical,
            numerical,
            elapsed_time,
        })
    }
}

fn label_of(cell: &Cell) -> Option<Cow<'_, str>> {
    match cell {
        Cell::Text(s) => Some(Cow::Borrowed(s.as_str())),
        other => other.as_label().map(Cow::Owned),
    }
}

fn coerce_numeric(column: &str, cells: &[Cell]) -> Result<Vec<Option<f64>>> {
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.as_number().map_err(|value| FeatureError::NonNumeric {
                column: column.to_string(),
                row,
                value,
            })
        })
        .collect()
}

/// Integer-like session identifier; `"42"`, `42` and `42.0` are accepted.
pub(crate) fn parse_session_id(row: usize, cell: &Cell) -> Result<Option<i64>> {
    let invalid = |value: String| FeatureError::InvalidSessionId { row, value };
    match cell {
        Cell::Null => Ok(None),
        Cell::Integer(i) => Ok(Some(*i)),
        Cell::Number(n) if n.is_nan() => Ok(None),
        Cell::Number(n) => exact_i64(*n).map(Some).ok_or_else(|| invalid(n.to_string())),
        Cell::Text(s) => {
            if let Ok(id) = s.trim().parse::<i64>() {
                return Ok(Some(id));
            }
            match cell.as_number() {
                Ok(None) => Ok(None),
                Ok(Some(n)) => exact_i64(n).map(Some).ok_or_else(|| invalid(s.clone())),
                Err(_) => Err(invalid(s.clone())),
            }
        }
    }
}

/// `value` as an `i64` when it is integral and inside the `i64` range.
fn exact_i64(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}

// ── FeatureAggregator ─────────────────────────────────────────────────────────

/// Builds the feature table of an event table under one taxonomy.
#[derive(Debug, Clone, Copy)]
pub struct FeatureAggregator<'t> {
    taxonomy: &'t Taxonomy,
    feature_set: FeatureSet,
}

impl<'t> FeatureAggregator<'t> {
    pub fn new(taxonomy: &'t Taxonomy, feature_set: FeatureSet) -> Self {
        Self {
            taxonomy,
            feature_set,
        }
    }

    /// Output feature columns, independent of any data.
    pub fn columns(&self) -> Vec<String> {
        feature_columns(self.taxonomy, self.feature_set)
    }

    /// Aggregate `table` into one row per (session, level group) pair.
    ///
    /// Rows whose session id or level group is null belong to no group and are
    /// skipped. Groups are emitted by ascending session id, then level group.
    /// Any error aborts the whole transform.
    pub fn aggregate(&self, table: &EventTable) -> Result<FeatureTable> {
        let typed = TypedColumns::from_table(table, self.taxonomy)?;
        let groups = group_rows(&typed);

        let skipped = table.len() - groups.values().map(Vec::len).sum::<usize>();
        if skipped > 0 {
            warn!("Skipped {} rows with a null session id or level group", skipped);
        }

        let columns = self.columns();
        let rows: Vec<FeatureRow> = groups
            .into_iter()
            .map(|((session_id, level_group), members)| {
                let values = self.group_values(&typed, &members, columns.len());
                debug_assert_eq!(values.len(), columns.len());
                FeatureRow {
                    session_id,
                    level_group: level_group.into_owned(),
                    values,
                }
            })
            .collect();

        debug!(
            "Aggregated {} events into {} rows x {} {} features",
            table.len(),
            rows.len(),
            columns.len(),
            self.feature_set
        );

        Ok(FeatureTable { columns, rows })
    }

    /// Feature values of one group, in [`feature_columns`] order.
    fn group_values(&self, typed: &TypedColumns<'_>, members: &[usize], width: usize) -> Vec<f64> {
        let mut values: Vec<Option<f64>> = Vec::with_capacity(width);

        for column in &typed.categorical {
            let distinct = count_distinct(members.iter().map(|&r| column[r].as_deref()));
            values.push(Some(distinct as f64));
        }

        let summaries: Vec<NumericSummary> = typed
            .numerical
            .iter()
            .map(|column| {
                let observed: Vec<f64> = members.iter().filter_map(|&r| column[r]).collect();
                NumericSummary::from_values(&observed)
            })
            .collect();

        values.extend(summaries.iter().map(|s| s.mean));
        values.extend(summaries.iter().map(|s| s.std));

        if self.feature_set == FeatureSet::Extended {
            values.extend(summaries.iter().map(|s| Some(s.range)));
            values.extend(summaries.iter().map(|s| s.median));

            let mut hits = vec![0usize; self.taxonomy.events().len()];
            for event in members.iter().filter_map(|&r| typed.events[r]) {
                hits[event] += 1;
            }
            values.extend(hits.iter().map(|&h| Some(h as f64)));
            values.push(Some(summaries[typed.elapsed_time].sum));
            values.extend(hits.iter().map(|&h| indicator_mode(h, members.len())));
        }

        values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(MISSING_SENTINEL))
            .collect()
    }
}

/// Row indices per (session id, level group), ordered by key.
fn group_rows<'a>(typed: &TypedColumns<'a>) -> BTreeMap<(i64, Cow<'a, str>), Vec<usize>> {
    let mut groups: BTreeMap<(i64, Cow<'a, str>), Vec<usize>> = BTreeMap::new();
    for (row, (session, level)) in typed
        .session_ids
        .iter()
        .zip(&typed.level_groups)
        .enumerate()
    {
        if let (Some(session), Some(level)) = (session, level) {
            groups
                .entry((*session, level.clone()))
                .or_default()
                .push(row);
        }
    }
    groups
}

/// Basic feature set: nunique, mean and std.
pub fn aggregate_basic(table: &EventTable, taxonomy: &Taxonomy) -> Result<FeatureTable> {
    FeatureAggregator::new(taxonomy, FeatureSet::Basic).aggregate(table)
}

/// Extended feature set: basic plus range, median, sums and modes.
pub fn aggregate_extended(table: &EventTable, taxonomy: &Taxonomy) -> Result<FeatureTable> {
    FeatureAggregator::new(taxonomy, FeatureSet::Extended).aggregate(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

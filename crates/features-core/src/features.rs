use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::taxonomy::Taxonomy;

/// Value written wherever an aggregate is undefined (e.g. the standard
/// deviation of a single observation).
pub const MISSING_SENTINEL: f64 = -1.0;

/// Which aggregation passes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSet {
    /// Cardinality, mean and standard deviation.
    Basic,
    /// Everything in `Basic` plus range, median, event sums and event modes.
    #[default]
    Extended,
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSet::Basic => write!(f, "basic"),
            FeatureSet::Extended => write!(f, "extended"),
        }
    }
}

/// Suffix appended to a source column to name a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Nunique,
    Mean,
    Std,
    Range,
    Median,
    Sum,
    Mode,
}

impl Statistic {
    pub fn suffix(self) -> &'static str {
        match self {
            Statistic::Nunique => "nunique",
            Statistic::Mean => "mean",
            Statistic::Std => "std",
            Statistic::Range => "range",
            Statistic::Median => "median",
            Statistic::Sum => "sum",
            Statistic::Mode => "mode",
        }
    }

    /// `<source>_<suffix>`.
    pub fn feature_name(self, source: &str) -> String {
        format!("{source}_{}", self.suffix())
    }
}

/// Ordered feature column names produced for `taxonomy` under `set`.
///
/// Basic: `<categorical>_nunique`, `<numerical>_mean`, `<numerical>_std`.
/// Extended appends `<numerical>_range`, `<numerical>_median`,
/// `<event>_sum`, `<elapsed_time>_sum` and `<event>_mode`.
pub fn feature_columns(taxonomy: &Taxonomy, set: FeatureSet) -> Vec<String> {
    let mut columns = Vec::new();
    let per = |columns: &mut Vec<String>, names: &[String], stat: Statistic| {
        columns.extend(names.iter().map(|n| stat.feature_name(n)));
    };

    per(&mut columns, taxonomy.categorical(), Statistic::Nunique);
    per(&mut columns, taxonomy.numerical(), Statistic::Mean);
    per(&mut columns, taxonomy.numerical(), Statistic::Std);

    if set == FeatureSet::Extended {
        per(&mut columns, taxonomy.numerical(), Statistic::Range);
        per(&mut columns, taxonomy.numerical(), Statistic::Median);
        per(&mut columns, taxonomy.events(), Statistic::Sum);
        columns.push(Statistic::Sum.feature_name(taxonomy.elapsed_time()));
        per(&mut columns, taxonomy.events(), Statistic::Mode);
    }

    columns
}

/// One output row: the aggregates of a single (session, level group) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub session_id: i64,
    pub level_group: String,
    /// Values aligned with [`FeatureTable::columns`]; never NaN.
    pub values: Vec<f64>,
}

/// Dense feature matrix keyed by session identifier.
///
/// A session spanning several level groups contributes several rows; they
/// share the session id and are not merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a feature column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All rows keyed by `session_id`, in table order.
    pub fn rows_for_session(&self, session_id: i64) -> impl Iterator<Item = &FeatureRow> + '_ {
        self.rows.iter().filter(move |r| r.session_id == session_id)
    }

    /// The row of one (session, level group) pair.
    pub fn row(&self, session_id: i64, level_group: &str) -> Option<&FeatureRow> {
        self.rows
            .iter()
            .find(|r| r.session_id == session_id && r.level_group == level_group)
    }

    /// Feature value for one (session, level group) pair.
    pub fn value(&self, session_id: i64, level_group: &str, column: &str) -> Option<f64> {
        let i = self.column_index(column)?;
        self.row(session_id, level_group).map(|r| r.values[i])
    }

    /// Distinct session identifiers, ascending.
    pub fn session_ids(&self) -> BTreeSet<i64> {
        self.rows.iter().map(|r| r.session_id).collect()
    }
}

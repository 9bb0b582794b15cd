//! Column taxonomy: which input columns feed which statistics.
//!
//! A [`Taxonomy`] is an immutable value handed to the aggregator. The default
//! reproduces the game's telemetry schema; alternative taxonomies can be
//! loaded from JSON so several can coexist (e.g. in tests).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FeatureError, Result};
use crate::features::{feature_columns, FeatureSet};

/// Column grouping rows into sessions.
pub const SESSION_ID_COLUMN: &str = "session_id";
/// Column partitioning a session's timeline into level segments.
pub const LEVEL_GROUP_COLUMN: &str = "level_group";
/// Column holding the event vocabulary value of each row.
pub const EVENT_NAME_COLUMN: &str = "event_name";

pub const DEFAULT_CATEGORICAL: &[&str] = &["event_name", "fqid", "room_fqid", "text_fqid", "text", "name"];

pub const DEFAULT_NUMERICAL: &[&str] = &[
    "elapsed_time",
    "level",
    "page",
    "room_coor_x",
    "room_coor_y",
    "screen_coor_x",
    "screen_coor_y",
    "hover_duration",
];

pub const DEFAULT_EVENTS: &[&str] = &[
    "navigate_click",
    "person_click",
    "cutscene_click",
    "object_click",
    "map_hover",
    "notification_click",
    "map_click",
    "observation_click",
    "checkpoint",
];

pub const DEFAULT_ELAPSED_TIME: &str = "elapsed_time";

/// On-disk shape of a taxonomy file, validated into a [`Taxonomy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaxonomyFile {
    categorical: Vec<String>,
    numerical: Vec<String>,
    #[serde(default)]
    events: Vec<String>,
    #[serde(default = "default_elapsed_time")]
    elapsed_time: String,
}

fn default_elapsed_time() -> String {
    DEFAULT_ELAPSED_TIME.to_string()
}

/// Validated, ordered column taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaxonomyFile", into = "TaxonomyFile")]
pub struct Taxonomy {
    categorical: Vec<String>,
    numerical: Vec<String>,
    events: Vec<String>,
    elapsed_time: String,
}

impl TryFrom<TaxonomyFile> for Taxonomy {
    type Error = FeatureError;

    fn try_from(file: TaxonomyFile) -> Result<Self> {
        Taxonomy::new(file.categorical, file.numerical, file.events, file.elapsed_time)
    }
}

impl From<Taxonomy> for TaxonomyFile {
    fn from(t: Taxonomy) -> Self {
        TaxonomyFile {
            categorical: t.categorical,
            numerical: t.numerical,
            events: t.events,
            elapsed_time: t.elapsed_time,
        }
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        let owned = |names: &[&str]| -> Vec<String> { names.iter().map(|s| s.to_string()).collect() };
        Self {
            categorical: owned(DEFAULT_CATEGORICAL),
            numerical: owned(DEFAULT_NUMERICAL),
            events: owned(DEFAULT_EVENTS),
            elapsed_time: DEFAULT_ELAPSED_TIME.to_string(),
        }
    }
}

impl Taxonomy {
    /// Build and validate a taxonomy.
    ///
    /// Fails with [`FeatureError::InvalidTaxonomy`] when a set is empty or
    /// holds duplicates, when a column is both categorical and numerical, when
    /// `elapsed_time` is not a numerical column, or when two derived feature
    /// names would collide.
    pub fn new(
        categorical: Vec<String>,
        numerical: Vec<String>,
        events: Vec<String>,
        elapsed_time: impl Into<String>,
    ) -> Result<Self> {
        let taxonomy = Self {
            categorical,
            numerical,
            events,
            elapsed_time: elapsed_time.into(),
        };
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Load a taxonomy from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| FeatureError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let taxonomy: Taxonomy = serde_json::from_str(&content)?;
        debug!(
            "Loaded taxonomy from {}: {} categorical, {} numerical, {} events",
            path.display(),
            taxonomy.categorical.len(),
            taxonomy.numerical.len(),
            taxonomy.events.len()
        );
        Ok(taxonomy)
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn numerical(&self) -> &[String] {
        &self.numerical
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Numerical column whose per-group total is emitted as `<col>_sum`.
    pub fn elapsed_time(&self) -> &str {
        &self.elapsed_time
    }

    /// Every input column the aggregator reads, in first-use order.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        [SESSION_ID_COLUMN, LEVEL_GROUP_COLUMN, EVENT_NAME_COLUMN]
            .into_iter()
            .chain(self.categorical.iter().map(String::as_str))
            .chain(self.numerical.iter().map(String::as_str))
            .filter(|c| seen.insert(*c))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.categorical.is_empty() {
            return Err(FeatureError::InvalidTaxonomy(
                "categorical column set is empty".into(),
            ));
        }
        if self.numerical.is_empty() {
            return Err(FeatureError::InvalidTaxonomy(
                "numerical column set is empty".into(),
            ));
        }

        for (label, names) in [
            ("categorical", &self.categorical),
            ("numerical", &self.numerical),
            ("event", &self.events),
        ] {
            let mut seen = HashSet::new();
            for name in names {
                if name.trim().is_empty() {
                    return Err(FeatureError::InvalidTaxonomy(format!(
                        "empty {label} name"
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(FeatureError::InvalidTaxonomy(format!(
                        "duplicate {label} name '{name}'"
                    )));
                }
            }
        }

        if let Some(shared) = self.categorical.iter().find(|c| self.numerical.contains(c)) {
            return Err(FeatureError::InvalidTaxonomy(format!(
                "column '{shared}' is both categorical and numerical"
            )));
        }

        if !self.numerical.contains(&self.elapsed_time) {
            return Err(FeatureError::InvalidTaxonomy(format!(
                "elapsed time column '{}' is not numerical",
                self.elapsed_time
            )));
        }

        let columns = feature_columns(self, FeatureSet::Extended);
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(FeatureError::InvalidTaxonomy(format!(
                "feature name '{dup}' is produced twice"
            )));
        }

        Ok(())
    }
}

//! Shared building blocks for the session feature pipeline.
//!
//! Holds the column taxonomy, the raw event table and feature table models,
//! the descriptive statistics used by the aggregator, error types and the
//! command-line settings.

pub mod error;
pub mod features;
pub mod settings;
pub mod stats;
pub mod table;
pub mod taxonomy;

pub use error::{FeatureError, Result};
pub use features::{feature_columns, FeatureRow, FeatureSet, FeatureTable, MISSING_SENTINEL};
pub use table::{Cell, EventTable};
pub use taxonomy::Taxonomy;

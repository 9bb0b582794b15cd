//! Data layer for the feature engineer.
//!
//! Discovers and reads raw event and label files, aggregates events into
//! per-(session, level group) features, pivots labels into a per-session
//! matrix and writes both back out. [`pipeline`] ties the stages together.

pub mod aggregator;
pub mod labels;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use features_core as core;

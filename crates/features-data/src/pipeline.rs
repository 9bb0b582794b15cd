//! End-to-end feature pipeline.
//!
//! Loads raw events, aggregates them into the feature matrix, optionally
//! pivots the labels, writes everything out and returns a [`PipelineResult`].

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use features_core::error::Result;
use features_core::features::{FeatureSet, FeatureTable};
use features_core::settings::{OutputFormat, Settings};
use features_core::taxonomy::Taxonomy;
use tracing::info;

use crate::aggregator::FeatureAggregator;
use crate::labels::{load_labels, session_order, LabelMatrix, DEFAULT_QUESTIONS};
use crate::reader::load_table;
use crate::writer::{write_features, write_labels_csv};

// ── Public types ──────────────────────────────────────────────────────────────

/// Inputs and outputs of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Event file or directory.
    pub events: PathBuf,
    /// Optional label file or directory.
    pub labels: Option<PathBuf>,
    /// Feature matrix destination.
    pub output: PathBuf,
    /// Label matrix destination; only used when `labels` is set.
    pub label_output: PathBuf,
    pub feature_set: FeatureSet,
    pub format: OutputFormat,
    pub questions: u8,
}

impl PipelineConfig {
    /// Config with the default feature set, format and question count.
    pub fn new(events: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        let label_output = output
            .parent()
            .map_or_else(|| PathBuf::from("true.csv"), |p| p.join("true.csv"));
        Self {
            events: events.into(),
            labels: None,
            output,
            label_output,
            feature_set: FeatureSet::default(),
            format: OutputFormat::default(),
            questions: DEFAULT_QUESTIONS,
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(s: &Settings) -> Self {
        Self {
            events: s.events.clone(),
            labels: s.labels.clone(),
            output: s.output.clone(),
            label_output: s.resolved_label_output(),
            feature_set: s.feature_set,
            format: s.format,
            questions: s.questions,
        }
    }
}

/// Metadata produced alongside the pipeline result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    pub feature_set: FeatureSet,
    /// Raw event rows read.
    pub events_processed: usize,
    /// Output rows, one per (session, level group).
    pub groups_created: usize,
    /// Distinct sessions in the output.
    pub sessions: usize,
    /// Feature columns per row, excluding the two key columns.
    pub feature_columns: usize,
    /// Label rows read, `None` when no label file was given.
    pub labels_processed: Option<usize>,
    /// Wall-clock seconds spent reading inputs.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent aggregating and pivoting.
    pub transform_time_seconds: f64,
    /// Wall-clock seconds spent writing outputs.
    pub write_time_seconds: f64,
}

/// The complete output of [`run_feature_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub features: FeatureTable,
    /// Session × question matrix, present when labels were supplied.
    pub labels: Option<LabelMatrix>,
    pub metadata: PipelineMetadata,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full pipeline.
///
/// 1. Load raw events (and labels, when configured).
/// 2. Aggregate events with the configured feature set.
/// 3. Pivot labels over the sessions in first-appearance order.
/// 4. Write the feature matrix and, if built, the label matrix.
///
/// Any data or configuration error aborts the run before anything is written.
pub fn run_feature_pipeline(config: &PipelineConfig, taxonomy: &Taxonomy) -> Result<PipelineResult> {
    // ── Step 1: Load ──────────────────────────────────────────────────────────
    let load_start = Instant::now();
    let events = load_table(&config.events)?;
    let labels = config.labels.as_deref().map(load_labels).transpose()?;
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 2-3: Transform ───────────────────────────────────────────────────
    let transform_start = Instant::now();
    let aggregator = FeatureAggregator::new(taxonomy, config.feature_set);
    let features = aggregator.aggregate(&events)?;
    let matrix = match &labels {
        Some(labels) => {
            let sessions = session_order(&events)?;
            Some(LabelMatrix::build(labels, &sessions, config.questions))
        }
        None => None,
    };
    let transform_time = transform_start.elapsed().as_secs_f64();

    // ── Step 4: Write ─────────────────────────────────────────────────────────
    let write_start = Instant::now();
    write_features(&features, &config.output, config.format)?;
    if let Some(matrix) = &matrix {
        write_labels_csv(matrix, &config.label_output)?;
    }
    let write_time = write_start.elapsed().as_secs_f64();

    let metadata = PipelineMetadata {
        generated_at: Utc::now().to_rfc3339(),
        feature_set: config.feature_set,
        events_processed: events.len(),
        groups_created: features.len(),
        sessions: features.session_ids().len(),
        feature_columns: features.columns.len(),
        labels_processed: labels.as_ref().map(Vec::len),
        load_time_seconds: load_time,
        transform_time_seconds: transform_time,
        write_time_seconds: write_time,
    };

    info!(
        "{} feature set: {} events -> {} rows x {} features ({} sessions) in {:.2}s",
        metadata.feature_set,
        metadata.events_processed,
        metadata.groups_created,
        metadata.feature_columns,
        metadata.sessions,
        load_time + transform_time + write_time
    );

    Ok(PipelineResult {
        features,
        labels: matrix,
        metadata,
    })
}

//! Per-question correctness labels.
//!
//! Label rows carry a composite id `<session>_q<question>` and a `correct`
//! flag. [`LabelMatrix`] pivots them into one row per session and one column
//! per question.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use features_core::error::{FeatureError, Result};
use features_core::table::EventTable;
use features_core::taxonomy::SESSION_ID_COLUMN;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregator::parse_session_id;
use crate::reader::load_table;

/// Column holding the composite label id in a label file.
pub const LABEL_ID_COLUMN: &str = "session_id";
/// Column holding the 0/1 outcome in a label file.
pub const CORRECT_COLUMN: &str = "correct";
/// Number of questions in the game.
pub const DEFAULT_QUESTIONS: u8 = 18;

fn label_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)_q(\d+)$").expect("regex is valid"))
}

/// One parsed label row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub session_id: i64,
    pub question: u32,
    pub correct: f64,
}

/// Split a composite id such as `20090312431273200_q7`.
pub fn parse_label_id(id: &str) -> Result<(i64, u32)> {
    let invalid = || FeatureError::InvalidLabelId(id.to_string());
    let caps = label_id_regex().captures(id.trim()).ok_or_else(invalid)?;
    let session = caps[1].parse::<i64>().map_err(|_| invalid())?;
    let question = caps[2].parse::<u32>().map_err(|_| invalid())?;
    Ok((session, question))
}

/// Extract labels from a loaded label table.
pub fn labels_from_table(table: &EventTable) -> Result<Vec<Label>> {
    let ids = table.require_column(LABEL_ID_COLUMN)?;
    let correct = table.require_column(CORRECT_COLUMN)?;

    ids.iter()
        .zip(correct)
        .enumerate()
        .map(|(row, (id, outcome))| {
            let id = id
                .as_label()
                .ok_or_else(|| FeatureError::InvalidLabelId(format!("<null> at row {row}")))?;
            let (session_id, question) = parse_label_id(&id)?;
            let correct = outcome
                .as_number()
                .map_err(|value| FeatureError::NonNumeric {
                    column: CORRECT_COLUMN.to_string(),
                    row,
                    value,
                })?
                .ok_or_else(|| FeatureError::NonNumeric {
                    column: CORRECT_COLUMN.to_string(),
                    row,
                    value: String::new(),
                })?;
            Ok(Label {
                session_id,
                question,
                correct,
            })
        })
        .collect()
}

/// Load and parse a label file (or directory of label files).
pub fn load_labels(path: &Path) -> Result<Vec<Label>> {
    let table = load_table(path)?;
    let labels = labels_from_table(&table)?;
    debug!("Parsed {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Distinct session ids in the order they first appear; null ids are skipped.
pub fn session_order(events: &EventTable) -> Result<Vec<i64>> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for (row, cell) in events.require_column(SESSION_ID_COLUMN)?.iter().enumerate() {
        if let Some(id) = parse_session_id(row, cell)? {
            if seen.insert(id) {
                order.push(id);
            }
        }
    }
    Ok(order)
}

/// Session × question outcome matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatrix {
    questions: u8,
    sessions: Vec<i64>,
    values: Vec<Vec<f64>>,
}

impl LabelMatrix {
    /// Pivot `labels` into one row per entry of `sessions`.
    ///
    /// Pairs without a label stay `0.0`. Labels for sessions not listed, or
    /// for questions outside `1..=questions`, are ignored. When a pair is
    /// labelled twice the later label wins.
    pub fn build(labels: &[Label], sessions: &[i64], questions: u8) -> Self {
        let width = usize::from(questions);
        let mut values = vec![vec![0.0; width]; sessions.len()];
        let rows: HashMap<i64, usize> = sessions
            .iter()
            .enumerate()
            .map(|(i, &s)| (s, i))
            .collect();

        let mut out_of_range = 0usize;
        let mut unknown_session = 0usize;
        for label in labels {
            let q = label.question as usize;
            if q == 0 || q > width {
                out_of_range += 1;
                continue;
            }
            match rows.get(&label.session_id) {
                Some(&row) => values[row][q - 1] = label.correct,
                None => unknown_session += 1,
            }
        }

        if out_of_range > 0 {
            warn!("Ignored {out_of_range} labels for questions outside 1..={questions}");
        }
        if unknown_session > 0 {
            debug!("Ignored {unknown_session} labels for sessions without events");
        }

        Self {
            questions,
            sessions: sessions.to_vec(),
            values,
        }
    }

    pub fn questions(&self) -> u8 {
        self.questions
    }

    pub fn sessions(&self) -> &[i64] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// `q1..qN` column names.
    pub fn column_names(&self) -> Vec<String> {
        (1..=self.questions).map(|q| format!("q{q}")).collect()
    }

    /// Rows in session order.
    pub fn rows(&self) -> impl Iterator<Item = (i64, &[f64])> + '_ {
        self.sessions
            .iter()
            .copied()
            .zip(self.values.iter().map(Vec::as_slice))
    }

    /// Outcome of one (session, 1-based question) pair.
    pub fn get(&self, session_id: i64, question: u8) -> Option<f64> {
        if question == 0 || question > self.questions {
            return None;
        }
        let row = self.sessions.iter().position(|&s| s == session_id)?;
        Some(self.values[row][usize::from(question) - 1])
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fixer::io::config::write_atomic;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::outcome::Outcome;
use crate::predictions::Prediction;
use crate::run::InstanceReport;

/// Totals over the prediction store.
#[derive(Debug, Default, PartialEq)]
pub struct StoreSummary {
    pub predictions: usize,
    pub graded: usize,
    pub correct: usize,
    pub pass_tests: usize,
    pub mean_score: Option<f64>,
}

pub fn summarize(predictions: &[Prediction]) -> StoreSummary {
    let mut summary = StoreSummary {
        predictions: predictions.len(),
        ..StoreSummary::default()
    };
    let mut total_score = 0u64;
    for evaluation in predictions.iter().filter_map(|p| p.evaluation.as_ref()) {
        summary.graded += 1;
        total_score += u64::from(evaluation.score);
        if evaluation.correct {
            summary.correct += 1;
        }
        if evaluation.pass_tests {
            summary.pass_tests += 1;
        }
    }
    if summary.graded > 0 {
        summary.mean_score = Some(total_score as f64 / summary.graded as f64);
    }
    summary
}

/// Persisted at `<root>/runs/<run_id>/summary.json` after a batch.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub dataset_name: String,
    pub split: String,
    /// SHA-256 of the dataset file, to tell which data a run saw.
    pub dataset_sha256: String,
    pub concurrency: usize,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    pub counts: BTreeMap<&'static str, usize>,
    pub instances: Vec<InstanceReport>,
}

pub struct RunSummaryInput<'a> {
    pub run_id: &'a str,
    pub dataset_name: &'a str,
    pub split: &'a str,
    pub dataset_sha256: String,
    pub concurrency: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<InstanceReport>,
}

impl RunSummary {
    pub fn new(input: RunSummaryInput<'_>) -> Self {
        let mut counts = BTreeMap::new();
        for outcome in [
            Outcome::Skipped,
            Outcome::Submitted,
            Outcome::Exhausted,
            Outcome::Error,
        ] {
            counts.insert(outcome.as_str(), 0);
        }
        for report in &input.reports {
            *counts.entry(report.outcome.as_str()).or_insert(0) += 1;
        }
        let duration = input.finished_at - input.started_at;
        Self {
            run_id: input.run_id.to_string(),
            dataset_name: input.dataset_name.to_string(),
            split: input.split.to_string(),
            dataset_sha256: input.dataset_sha256,
            concurrency: input.concurrency,
            start_time: input.started_at.to_rfc3339(),
            end_time: input.finished_at.to_rfc3339(),
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            counts,
            instances: input.reports,
        }
    }
}

pub fn summary_path(root: &Path, run_id: &str) -> PathBuf {
    root.join("runs").join(run_id).join("summary.json")
}

pub fn write_summary(root: &Path, summary: &RunSummary) -> Result<PathBuf> {
    let path = summary_path(root, &summary.run_id);
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    write_atomic(&path, &format!("{contents}\n"))?;
    Ok(path)
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(hex::encode(hasher.finalize()))
}

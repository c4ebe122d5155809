/// The per-islet strategy audit: plain-text choices list and JSON run report
use crate::bounds::PointCloudBounds;
use crate::config::MeshingConfig;
use crate::error::{IsletError, Result};
use crate::grid::GridGeometry;
use crate::reconstruct::{IsletOutcome, IsletStatus};
use crate::timing::PhaseTiming;
use serde::Serialize;
use std::fmt::Write;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub islets: usize,
    pub skipped: usize,
    pub reconstructed: usize,
    pub recovered: usize,
    pub failed: usize,
    pub files_written: usize,
    pub write_errors: usize,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[IsletOutcome]) -> Self {
        let mut summary = Summary {
            islets: outcomes.len(),
            ..Summary::default()
        };
        for outcome in outcomes {
            match outcome.status {
                IsletStatus::Skipped => summary.skipped += 1,
                IsletStatus::Reconstructed => summary.reconstructed += 1,
                IsletStatus::Recovered => summary.recovered += 1,
                IsletStatus::FailedAllStrategies => summary.failed += 1,
            }
            summary.files_written += outcome.files.len();
            summary.write_errors += usize::from(outcome.write_error.is_some());
        }
        summary
    }
}

/// Everything known about a finished run, written as `report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: String,
    pub point_count: usize,
    pub bounds: PointCloudBounds,
    pub grid: GridGeometry,
    pub labels_created: u32,
    pub config: MeshingConfig,
    pub summary: Summary,
    pub islets: Vec<IsletOutcome>,
    pub phases: Vec<PhaseTiming>,
}

/// One line per islet: its size, the strategy that produced its meshes and
/// every failed attempt before it.
pub fn choices_text(outcomes: &[IsletOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let _ = write!(
            out,
            "islet {} span {} points {}: ",
            outcome.label, outcome.span, outcome.point_count
        );

        let failures: Vec<String> = outcome
            .attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| format!("{} failed ({})", a.strategy, e)))
            .collect();

        match (outcome.status, outcome.strategy) {
            (IsletStatus::Skipped, _) => out.push_str("skipped, too few points"),
            (IsletStatus::FailedAllStrategies, _) | (_, None) => {
                let _ = write!(out, "dropped, {}", failures.join("; "));
            }
            (_, Some(strategy)) => {
                for failure in &failures {
                    let _ = write!(out, "{} -> ", failure);
                }
                let _ = write!(out, "{}", strategy);
                if !outcome.files.is_empty() {
                    let _ = write!(out, " [{}]", outcome.files.join(", "));
                }
            }
        }
        if let Some(error) = &outcome.write_error {
            let _ = write!(out, " (write failed: {})", error);
        }
        out.push('\n');
    }
    out
}

pub fn write_choices(path: &Path, outcomes: &[IsletOutcome]) -> Result<()> {
    fs::write(path, choices_text(outcomes)).map_err(|e| IsletError::io(path, e))
}

pub fn write_json(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|e| IsletError::io(path, e))
}

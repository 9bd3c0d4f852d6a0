//! Artifact export — merged table as CSV, run report as JSON.
//!
//! `report.json` carries a `schema_version`; reports from a newer schema are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chainlag_core::domain::MergedTable;

use crate::runner::{AnalysisReport, RunOutcome, SCHEMA_VERSION};

/// Length of the run id prefix used in artifact directory names.
const RUN_ID_PREFIX_LEN: usize = 12;

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_report_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AnalysisReport to JSON")
}

/// Deserialize an `AnalysisReport`, rejecting unknown schema versions.
pub fn import_report_json(json: &str) -> Result<AnalysisReport> {
    let report: AnalysisReport =
        serde_json::from_str(json).context("failed to deserialize AnalysisReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Columns: date, metric, price, return. An undefined return is an empty cell.
/// Values are written at full precision so the file parses back exactly.
pub fn export_table_csv(table: &MergedTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "metric", "price", "return"])?;

    for r in &table.records {
        let ret = r
            .derived_return
            .map(|v| v.to_string())
            .unwrap_or_default();
        wtr.write_record([
            r.date.to_string(),
            r.metric.to_string(),
            r.price.to_string(),
            ret,
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Write `results.csv` and `report.json` under
/// `{output_dir}/{metric}_{run_id prefix}/`.
///
/// Returns the path to the created directory. Rerunning the same config
/// overwrites the same directory.
pub fn save_artifacts(outcome: &RunOutcome, output_dir: &Path) -> Result<PathBuf> {
    let report = &outcome.report;
    let prefix: String = report.run_id.chars().take(RUN_ID_PREFIX_LEN).collect();
    let run_dir = output_dir.join(format!("{}_{prefix}", report.metric));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let csv = export_table_csv(&outcome.table)?;
    std::fs::write(run_dir.join("results.csv"), csv)
        .with_context(|| format!("failed to write results.csv in {}", run_dir.display()))?;

    let json = export_report_json(report)?;
    std::fs::write(run_dir.join("report.json"), json)
        .with_context(|| format!("failed to write report.json in {}", run_dir.display()))?;

    Ok(run_dir)
}

/// Load the report from an artifact directory.
pub fn load_report(dir: &Path) -> Result<AnalysisReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_report_json(&json)
}

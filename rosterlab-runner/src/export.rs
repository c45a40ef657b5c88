//! Report export: pretty JSON, a roster CSV sheet and a text summary.
//!
//! - **JSON**: full report serialization with schema versioning
//! - **CSV**: starter and backup sheet for spreadsheets
//! - **Text**: human-readable roster summary
//!
//! Unknown report schema versions are rejected on load.

use std::fmt::Write as _;

use thiserror::Error;

use rosterlab_core::domain::{Completeness, RosterResult, ScoreSource};

use crate::runner::{FormationOutcome, SelectionReport, REPORT_SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV buffer error: {0}")]
    Buffer(String),
    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &SelectionReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn import_json(json: &str) -> Result<SelectionReport, ExportError> {
    let report: SelectionReport = serde_json::from_str(json)?;
    if report.schema_version > REPORT_SCHEMA_VERSION {
        return Err(ExportError::UnsupportedVersion {
            found: report.schema_version,
            supported: REPORT_SCHEMA_VERSION,
        });
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per roster member.
///
/// Columns: role, id, category, price, final_score. Backups carry no price
/// or score because the result records only their ids.
pub fn export_roster_csv(roster: &RosterResult) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["role", "id", "category", "price", "final_score"])?;

    for s in &roster.starters {
        let role = if Some(s.id) == roster.leader { "leader" } else { "starter" };
        wtr.write_record([
            role,
            s.id.to_string().as_str(),
            s.category.name(),
            format!("{:.2}", s.price).as_str(),
            format!("{:.4}", s.final_score).as_str(),
        ])?;
    }
    if let Some(id) = roster.luxury_backup {
        let category = roster
            .leader
            .and_then(|l| roster.starters.iter().find(|s| s.id == l))
            .map_or("", |s| s.category.name());
        wtr.write_record(["luxury_backup", id.to_string().as_str(), category, "", ""])?;
    }
    for (category, id) in &roster.regular_backups {
        wtr.write_record(["backup", id.to_string().as_str(), category.name(), "", ""])?;
    }

    let bytes = wtr.into_inner().map_err(|e| ExportError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Buffer(e.to_string()))
}

// ─── Text summary ───────────────────────────────────────────────────

pub fn render_roster(roster: &RosterResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Formation {}  cost {:.2} / {:.2}  expected {:.2}  solver {:?}",
        roster.formation, roster.total_cost, roster.budget, roster.expected_score, roster.solver
    );
    for s in &roster.starters {
        let mark = if Some(s.id) == roster.leader { " (C)" } else { "" };
        let _ = writeln!(
            out,
            "  {:<4} {:>6}  {:>7.2}  {:>7.2}{}",
            s.category.code(),
            s.id,
            s.price,
            s.final_score,
            mark
        );
    }
    if let Some(id) = roster.luxury_backup {
        let _ = writeln!(out, "  luxury backup: {id}");
    }
    if !roster.regular_backups.is_empty() {
        let backups: Vec<String> = roster
            .regular_backups
            .iter()
            .map(|(c, id)| format!("{}={}", c.code(), id))
            .collect();
        let _ = writeln!(out, "  backups: {}", backups.join(", "));
    }
    if let Completeness::Partial { unfilled } = &roster.completeness {
        for slot in unfilled {
            let _ = writeln!(out, "  UNFILLED {} x{} ({:?})", slot.category.code(), slot.missing, slot.reason);
        }
    }
    if roster.budget_infeasible {
        let _ = writeln!(out, "  budget cannot cover the cheapest complete roster");
    }
    out
}

pub fn render_report(report: &SelectionReport) -> String {
    let mut out = String::new();
    let source = match &report.score_source {
        ScoreSource::Oracle { name } => format!("oracle '{name}'"),
        ScoreSource::Composite { reason: None } => "composite".to_string(),
        ScoreSource::Composite { reason: Some(r) } => format!("composite (oracle failed: {r})"),
    };
    let _ = writeln!(
        out,
        "Round {}: {} candidates, {} eligible, {} traps; scores from {}",
        report.history_round, report.candidates, report.eligible, report.traps, source
    );
    for outcome in &report.outcomes {
        match outcome {
            FormationOutcome::Completed { roster } => {
                let _ = writeln!(out);
                out.push_str(&render_roster(roster));
            }
            FormationOutcome::Skipped { formation } => {
                let _ = writeln!(out, "\nFormation {formation} skipped (deadline)");
            }
        }
    }
    if let Some(best) = &report.best {
        let _ = writeln!(out, "\nBest formation: {best}");
    }
    out
}

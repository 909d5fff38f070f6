//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::executor::{ExecutionOutcome, InvocationStatus};
use crate::manifest::{LockInfo, Manifest, ValidationResult};
use crate::planner::{ProvisionPlan, Qualification};
use crate::reconciler::RunReport;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan entry row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Provision")]
    name: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Decision")]
    decision: String,
}

/// Execution outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Provision")]
    name: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a provisioning plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ProvisionPlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    fn format_plan_text(plan: &ProvisionPlan) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "\nProvisioning Plan");
        let _ = writeln!(output, "   Template: {}", plan.source_repo);
        if let Some(bucket) = &plan.remote_bucket {
            let _ = writeln!(output, "   Remote state bucket: {bucket}");
        }
        output.push('\n');

        if plan.entries.is_empty() {
            let _ = writeln!(output, "{} No provisions declared.", "✓".green());
            return output;
        }

        let rows: Vec<PlanRow> = plan
            .entries
            .iter()
            .map(|e| PlanRow {
                name: e.name.clone(),
                action: e.action.to_string(),
                state: e.state.to_string(),
                decision: Self::format_qualification(e.qualification),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if plan.is_noop() {
            let _ = write!(
                output,
                "\n{} Nothing to do - every provision is up to date.\n",
                "✓".green()
            );
        } else {
            let _ = write!(
                output,
                "\nPlan: {} to execute, {} to skip\n",
                plan.eligible_count().to_string().green(),
                plan.skipped_count().to_string().dimmed()
            );
        }

        output
    }

    /// Formats the report of a completed run.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        let status = if report.success {
            format!("{} Provisioning run complete", "✓".green())
        } else {
            format!("{} Provisioning run finished with held failures", "✗".red())
        };
        let _ = writeln!(output, "{status}\n");
        let _ = writeln!(output, "   Manifest: {}", report.manifest);
        let _ = writeln!(
            output,
            "   Template: {}",
            if report.workspace.template_fetched { "fetched" } else { "reused" }
        );

        if report.executed.is_empty() {
            let _ = writeln!(output, "   Nothing executed.");
        } else {
            let rows: Vec<OutcomeRow> = report.executed.iter().map(Self::outcome_row).collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(
            output,
            "\nExecuted: {}, failed: {}, skipped: {}\n",
            report.executed.len().to_string().green(),
            report.failed_count().to_string().red(),
            report.skipped.len().to_string().dimmed()
        );

        if !report.skipped.is_empty() {
            let _ = writeln!(output, "\nSkipped:");
            for skipped in &report.skipped {
                let _ = writeln!(output, "   - {} ({})", skipped.name, skipped.reason);
            }
        }

        if !report.held.is_empty() {
            let _ = write!(output, "\n{} State held for:\n", "⚠".yellow());
            for name in &report.held {
                let _ = writeln!(output, "   - {name}");
            }
        }

        if !report.remote_state_failures.is_empty() {
            let _ = write!(output, "\n{} Remote state not configured for:\n", "⚠".yellow());
            for name in &report.remote_state_failures {
                let _ = writeln!(output, "   - {name}");
            }
        }

        output
    }

    /// Formats a validation result together with a manifest summary.
    #[must_use]
    pub fn format_validation(&self, manifest: &Manifest, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "tf_repo": manifest.source_repo,
                    "s3_bucket": manifest.remote_bucket(),
                    "provisions": manifest.provisions.len(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Manifest is valid!\n", "✓".green())
                } else {
                    let mut output = format!(
                        "{} Manifest has {} error(s):\n",
                        "✗".red(),
                        result.errors.len()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = writeln!(output, "\nManifest summary:");
                let _ = writeln!(output, "   Template: {}", manifest.source_repo);
                let _ = writeln!(
                    output,
                    "   Remote state bucket: {}",
                    manifest.remote_bucket().unwrap_or("(none)")
                );
                let _ = writeln!(output, "   Provisions: {}", manifest.provisions.len());
                output
            }
        }
    }

    /// Formats the result of a forced unlock.
    #[must_use]
    pub fn format_unlock(&self, removed: Option<&LockInfo>) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "removed": removed }))
                    .unwrap_or_default()
            }
            OutputFormat::Text => match removed {
                Some(lock) => format!(
                    "{} Removed lock {} held by {} since {}\n",
                    "✓".green(),
                    lock.lock_id,
                    lock.holder,
                    lock.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => format!("{} Manifest was not locked\n", "✓".green()),
            },
        }
    }

    fn outcome_row(outcome: &ExecutionOutcome) -> OutcomeRow {
        let result = match &outcome.status {
            InvocationStatus::Succeeded => outcome.status.to_string().green().to_string(),
            InvocationStatus::TimedOut { .. } => outcome.status.to_string().yellow().to_string(),
            InvocationStatus::Failed { .. } | InvocationStatus::SpawnFailed { .. } => {
                Self::truncate(&outcome.status.to_string(), 48).red().to_string()
            }
        };

        OutcomeRow {
            name: outcome.name.clone(),
            action: outcome.action.to_string(),
            result,
            duration: format!("{:.1}s", outcome.duration.as_secs_f64()),
        }
    }

    /// Formats a qualification decision with color.
    fn format_qualification(qualification: Qualification) -> String {
        match qualification {
            Qualification::Eligible => "execute".green().to_string(),
            Qualification::Skipped(reason) => format!("skip: {reason}").dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

//! Terminal integration for the reconciler - progress, confirmation, reports

use anyhow::Result;
use colored::Colorize;
use declarative::{ApplyResult, ConfirmCallback, ExecuteSummary, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use kmod::ReconciliationReport;
use std::time::Duration;

use crate::ui;

/// Spinner shown while modules are reconciled
pub struct TerminalProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl TerminalProgress {
    /// Counts modules as they finish; hidden when `quiet`
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {pos} done {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar.set_message("Reconciling");
            bar
        };
        Self { bar, verbose }
    }

    /// Confirmation prompt that pauses this spinner while asking
    pub fn confirm(&self, yes: bool) -> PromptConfirm {
        PromptConfirm {
            yes,
            bar: self.bar.clone(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_group_start(&mut self, name: &str, _count: usize) {
        self.bar.set_message(format!("(last: {name})"));
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        if self.verbose || matches!(result, ApplyResult::Failed { .. }) {
            self.bar.println(format!(
                "  {} {} {}",
                ui::symbol(result.outcome()),
                id,
                ui::describe(result).dimmed()
            ));
        }
    }

    fn on_group_complete(&mut self, _name: &str) {
        self.bar.inc(1);
    }
}

/// Asks before changing anything unless `--yes` was given
pub struct PromptConfirm {
    yes: bool,
    bar: ProgressBar,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        if self.yes {
            return Ok(true);
        }

        let confirmed = self
            .bar
            .suspend(|| Confirm::new().with_prompt(prompt).default(true).interact())?;

        Ok(confirmed)
    }
}

/// Print every operation of one module
pub fn print_report(report: &ReconciliationReport) {
    println!();
    println!("  {}", report.module.as_str().bold());

    if let Some(reason) = &report.aborted {
        println!("    {} {}", "✗".red(), reason);
        return;
    }

    for entry in &report.entries {
        println!(
            "    {} {:<44} {}",
            ui::symbol(entry.result.outcome()),
            entry.description,
            ui::describe(&entry.result).dimmed()
        );
    }
}

/// Totals over every report
pub fn summarize(reports: &[ReconciliationReport]) -> ExecuteSummary {
    let mut summary = ExecuteSummary::default();
    for report in reports {
        summary.merge(&report.summary());
    }
    summary
}

/// Print final summary
pub fn print_summary(reports: &[ReconciliationReport]) {
    let summary = summarize(reports);
    let aborted = reports.iter().filter(|r| r.aborted.is_some()).count();

    println!();
    if summary.is_success() && aborted == 0 {
        if summary.total_changes() == 0 {
            println!("  {} Everything up to date", "✓".green().bold());
        } else {
            println!("  {} Modules reconciled successfully!", "✓".green().bold());
        }
    } else {
        println!("  {} Modules reconciled with errors", "⚠".yellow().bold());
    }

    if summary.executed > 0 {
        println!("    • {} commands run", summary.executed);
    }
    if summary.created > 0 {
        println!("    • {} files created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} files modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} files removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} operations skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "operations".red());
    }
    if aborted > 0 {
        println!("    • {} {} rejected", aborted, "modules".red());
    }
}

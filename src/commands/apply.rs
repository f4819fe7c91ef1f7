//! `kmodctl apply` - reconcile the modules listed in the configuration

use anyhow::{Result, bail};
use declarative::ExecuteOptions;
use kmod::{LoadRequest, Reconciler};
use std::io::IsTerminal;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{TerminalProgress, display_diff, print_report, print_summary};
use crate::ui;

/// Returns whether every module converged without errors
pub fn run(ctx: &Context, args: ApplyArgs) -> Result<bool> {
    let config = super::load_config(ctx)?;
    let requests = config.select(&args.modules)?;

    if requests.is_empty() {
        if !args.json {
            ui::info("No modules configured");
        }
        return Ok(true);
    }

    check_confirmable(&args, std::io::stdin().is_terminal())?;

    let profile = super::host_profile(&config)?;
    let options = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
        verbose: ctx.verbose > 0,
    };
    let reconciler = super::reconciler(profile, options);

    let interactive = !args.json && !ctx.quiet;
    if interactive && !args.yes && !args.dry_run {
        show_pending(&reconciler, &requests, &config.permissions);
    }

    let mut progress = TerminalProgress::new(!interactive, ctx.verbose > 0);
    let mut confirm = progress.confirm(args.yes);
    let reports =
        reconciler.reconcile_all(&requests, &config.permissions, &mut progress, &mut confirm);
    progress.finish();
    let reports = reports?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else if !ctx.quiet {
        for report in &reports {
            print_report(report);
        }
        if args.dry_run {
            println!();
            ui::info("Dry run - no changes made");
        }
        print_summary(&reports);
    }

    Ok(reports.iter().all(kmod::ReconciliationReport::is_success))
}

/// Refuse to start a run that would need a prompt nobody can answer
fn check_confirmable(args: &ApplyArgs, terminal: bool) -> Result<()> {
    if args.yes || args.dry_run {
        return Ok(());
    }
    if args.json {
        bail!("--json cannot prompt for confirmation; pass --yes or --dry-run");
    }
    if !terminal {
        bail!("stdin is not a terminal; pass --yes to apply without confirmation");
    }
    Ok(())
}

/// Show what the confirmation prompt is about to approve
fn show_pending(reconciler: &Reconciler, requests: &[LoadRequest], policy: &kmod::PermissionPolicy) {
    let mut diffs = Vec::new();
    for request in requests {
        match reconciler.diff(request, policy) {
            Ok(found) => diffs.extend(found),
            Err(e) => ui::warn(&format!("{}: {e}", request.name)),
        }
    }
    display_diff(&diffs);
}

//! `kmodctl load` - reconcile one module given on the command line

use anyhow::{Context as _, Result};
use declarative::ExecuteOptions;
use kmod::{LoadRequest, ModuleName};

use crate::Context;
use crate::cli::LoadArgs;
use crate::config;
use crate::engine::{print_report, print_summary};
use crate::ui;

/// Returns whether every operation succeeded
pub fn run(ctx: &Context, args: LoadArgs) -> Result<bool> {
    let config = super::load_config(ctx)?;
    let profile = super::host_profile(&config)?;
    let policy = super::permissions(&config.permissions, &args.permissions)?;

    let name = ModuleName::parse(&args.name)?;
    let mut request = LoadRequest::new(name, args.ensure.into());
    if let Some(file) = &args.file {
        request = request.with_target_file(config::expand(file));
    }

    let options = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: 1,
        verbose: ctx.verbose > 0,
    };
    let reconciler = super::reconciler(profile, options);

    let report = reconciler
        .reconcile(&request, &policy)
        .with_context(|| format!("Cannot reconcile module '{}'", request.name))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.is_success());
    }

    if !ctx.quiet {
        print_report(&report);
        if args.dry_run {
            println!();
            ui::info("Dry run - no changes made");
        }
    }

    let reports = [report];
    if !ctx.quiet {
        print_summary(&reports);
    }
    Ok(reports[0].is_success())
}

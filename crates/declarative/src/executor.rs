//! Execution engine - applies resource groups with parallelism and keyed locking

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::compute_diffs;
use crate::lock::{LockTable, lock};
use crate::planner::{ExecutionPlan, ResourceGroup};
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::mpsc;
use std::thread;

/// Outcome of one resource, in the order it was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    pub id: String,
    pub resource_type: String,
    pub description: String,
    #[serde(flatten)]
    pub result: ApplyResult,
}

impl ResourceReport {
    pub fn new(resource: &dyn Resource, result: ApplyResult) -> Self {
        Self {
            id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            result,
        }
    }
}

/// Outcomes of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub entries: Vec<ResourceReport>,
}

impl GroupReport {
    pub fn summary(&self) -> ExecuteSummary {
        self.entries.iter().map(|e| &e.result).collect()
    }
}

/// Execute a plan with the given options and callbacks
///
/// # Type Parameters
/// * `P` - Progress callback type
/// * `C` - Confirm callback type
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `locks` - Lock table shared by every resource writing a keyed target
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback, asked once when changes are pending
///
/// # Returns
/// One report per group, in plan order. Every resource gets an entry,
/// including those already converged. Progress is reported as each group
/// finishes, in completion order.
pub fn execute<P, C>(
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    locks: &LockTable,
    progress: &mut P,
    confirm: &mut C,
) -> Result<Vec<GroupReport>>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    if !opts.dry_run {
        let pending: usize = plan
            .groups
            .iter()
            .map(|g| compute_diffs(&g.resources).len())
            .sum();

        if pending > 0
            && !confirm.confirm(&format!("Apply {pending} pending change(s)?"))?
        {
            let reports = plan
                .groups
                .iter()
                .map(|g| skip_group(g, "declined by user"))
                .collect();
            return Ok(reports);
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    let (finished, completions) = mpsc::channel::<GroupReport>();

    let joined = thread::scope(|scope| {
        let worker = scope.spawn(move || {
            pool.install(|| {
                plan.groups
                    .par_iter()
                    .map(|group| {
                        let report = execute_group(group, opts, locks);
                        let _ = finished.send(report.clone());
                        report
                    })
                    .collect::<Vec<_>>()
            })
        });

        // Ends once the worker drops its sender
        for report in completions {
            progress.on_group_start(&report.name, report.entries.len());
            for entry in &report.entries {
                progress.on_resource_complete(&entry.id, &entry.result);
            }
            progress.on_group_complete(&report.name);
        }

        worker.join()
    });

    joined.map_err(|_| anyhow::anyhow!("Apply worker panicked"))
}

/// Apply every resource of a group in order
///
/// A failed resource never stops the ones after it.
pub fn execute_group(group: &ResourceGroup, opts: &ExecuteOptions, locks: &LockTable) -> GroupReport {
    let entries = group
        .resources
        .iter()
        .map(|resource| {
            let result = apply_resource(resource.as_ref(), opts, locks);
            ResourceReport::new(resource.as_ref(), result)
        })
        .collect();

    GroupReport {
        name: group.name.clone(),
        entries,
    }
}

/// Apply a single resource, holding its lock if it has one
fn apply_resource(resource: &dyn Resource, opts: &ExecuteOptions, locks: &LockTable) -> ApplyResult {
    let handle = resource.lock_key().map(|key| locks.handle(&key));
    let _guard = handle.as_deref().map(lock);

    let result = if opts.dry_run {
        match resource.needs_apply() {
            Ok(false) => Ok(ApplyResult::Unchanged),
            Ok(true) => Ok(ApplyResult::Skipped {
                reason: format!("dry run: would {}", lowercase_first(&resource.description())),
            }),
            Err(e) => Err(e),
        }
    } else {
        let mut ctx = ApplyContext::new(opts.verbose);
        resource.apply(&mut ctx)
    };

    match result {
        Ok(result) => {
            if result.is_change() {
                log::info!("{}: {:?}", resource.id(), result);
            } else {
                log::debug!("{}: {:?}", resource.id(), result);
            }
            result
        }
        Err(e) => {
            log::error!("{} failed: {e:#}", resource.id());
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

fn skip_group(group: &ResourceGroup, reason: &str) -> GroupReport {
    GroupReport {
        name: group.name.clone(),
        entries: group
            .resources
            .iter()
            .map(|r| {
                ResourceReport::new(
                    r.as_ref(),
                    ApplyResult::Skipped {
                        reason: reason.to_string(),
                    },
                )
            })
            .collect(),
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

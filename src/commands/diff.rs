//! `kmodctl diff` - pending changes without applying them

use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::{ExecuteOptions, ResourceDiff};
use kmod::{
    Collaborators, CompiledModule, EnsureState, FileStore, ModuleName, PersistenceArtifact,
};
use serde::Serialize;

use crate::Context;
use crate::cli::DiffArgs;
use crate::engine::{display_diff, show_content_diff};

#[derive(Serialize)]
struct ModuleDiff {
    module: ModuleName,
    changes: Vec<ResourceDiff>,
}

pub fn run(ctx: &Context, args: DiffArgs) -> Result<bool> {
    let config = super::load_config(ctx)?;
    let requests = config.select(&args.modules)?;
    let profile = super::host_profile(&config)?;
    let reconciler = super::reconciler(profile, ExecuteOptions::default());
    let files = Collaborators::system().files;

    let mut modules = Vec::new();
    for request in &requests {
        let changes = reconciler
            .diff(request, &config.permissions)
            .with_context(|| format!("Cannot diff module '{}'", request.name))?;
        modules.push(ModuleDiff {
            module: request.name.clone(),
            changes,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(true);
    }

    let all: Vec<ResourceDiff> = modules
        .iter()
        .flat_map(|m| m.changes.iter().cloned())
        .collect();
    display_diff(&all);

    for (request, module) in requests.iter().zip(&modules) {
        if module.changes.is_empty() {
            continue;
        }
        let compiled = reconciler.compile(request, &config.permissions)?;
        show_file_content(&compiled, files.as_ref(), &module.changes)?;
    }

    Ok(true)
}

/// Content diff of a whole-file artifact with pending changes
fn show_file_content(
    compiled: &CompiledModule,
    files: &dyn FileStore,
    changes: &[ResourceDiff],
) -> Result<()> {
    let file = match compiled.artifact() {
        Some(PersistenceArtifact::UnitFile(file) | PersistenceArtifact::ScriptFile(file)) => file,
        _ => return Ok(()),
    };

    let id = format!("file:{}", file.path.display());
    if !changes.iter().any(|c| c.resource_id == id) {
        return Ok(());
    }

    let current = files.read_file(&file.path)?.unwrap_or_default();
    let desired = match file.ensure {
        EnsureState::Present => file.content.as_str(),
        EnsureState::Absent => "",
    };

    println!();
    println!("  {}", file.path.display().to_string().bold());
    show_content_diff(&current, desired);
    Ok(())
}

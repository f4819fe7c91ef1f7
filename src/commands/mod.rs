pub mod apply;
pub mod diff;
pub mod facts;
pub mod load;

use anyhow::{Context as _, Result};
use declarative::ExecuteOptions;
use kmod::{Collaborators, HostProfile, PermissionPolicy, Reconciler, parse_mode};

use crate::Context;
use crate::cli::PermissionArgs;
use crate::config::Config;

/// Configuration named by `--config`, or the default one
pub fn load_config(ctx: &Context) -> Result<Config> {
    Config::load(ctx.config.as_deref())
}

/// Host facts, from the configuration override or detection
pub fn host_profile(config: &Config) -> Result<HostProfile> {
    let profile = config
        .facts()
        .host_profile()
        .context("Could not determine host facts")?;
    log::info!("Host: {profile}");
    Ok(profile)
}

/// Reconciler acting on the running host
pub fn reconciler(profile: HostProfile, options: ExecuteOptions) -> Reconciler {
    Reconciler::new(Collaborators::system(), profile).with_options(options)
}

/// Configured permission policy with command line overrides applied
pub fn permissions(base: &PermissionPolicy, args: &PermissionArgs) -> Result<PermissionPolicy> {
    let mut policy = base.clone();
    if let Some(owner) = &args.owner {
        policy.owner.clone_from(owner);
    }
    if let Some(group) = &args.group {
        policy.group.clone_from(group);
    }
    if let Some(mode) = &args.file_mode {
        policy.file_mode = parse_mode(mode).context("Invalid --file-mode")?;
    }
    if let Some(mode) = &args.exec_mode {
        policy.exec_mode = parse_mode(mode).context("Invalid --exec-mode")?;
    }
    Ok(policy)
}

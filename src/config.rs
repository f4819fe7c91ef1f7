//! kmodctl configuration file
//!
//! ```toml
//! [permissions]
//! owner = "root"
//! group = "root"
//! file_mode = "0644"
//! exec_mode = "0755"
//!
//! # Optional: skip detection
//! [host]
//! init_system = "other"
//! family = "debian"
//!
//! [[module]]
//! name = "br_netfilter"
//!
//! [[module]]
//! name = "pcspkr"
//! ensure = "absent"
//! file = "/etc/modules"
//! ```

use anyhow::{Context, Result, bail};
use kmod::{
    DistributionFamily, FactsProvider, HostProfile, InitSystem, LoadRequest, PermissionPolicy,
    StaticFacts, SystemFacts,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration read when `--config` is not given
pub const DEFAULT_CONFIG: &str = "/etc/kmodctl/kmodctl.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub permissions: PermissionPolicy,
    pub host: Option<HostOverride>,
    #[serde(rename = "module")]
    pub modules: Vec<LoadRequest>,
}

/// Fixed host facts, for hosts where detection guesses wrong
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostOverride {
    pub init_system: InitSystem,
    pub family: DistributionFamily,
}

impl Config {
    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("Invalid configuration")?;

        let mut seen = HashSet::new();
        for module in &mut config.modules {
            if !seen.insert(module.name.canonical()) {
                bail!("Module '{}' is listed more than once", module.name);
            }
            if let Some(file) = &module.target_file {
                module.target_file = Some(expand(file));
            }
        }
        Ok(config)
    }

    /// Load the configuration
    ///
    /// An explicit path must exist. The default path may be missing, in
    /// which case defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (expand(path), true),
            None => (PathBuf::from(DEFAULT_CONFIG), false),
        };

        if !explicit && !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        log::debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Where host facts come from
    pub fn facts(&self) -> Box<dyn FactsProvider> {
        match self.host {
            Some(host) => Box::new(StaticFacts(HostProfile::new(host.init_system, host.family))),
            None => Box::new(SystemFacts::default()),
        }
    }

    /// Configured modules, narrowed to `names` when any are given
    pub fn select(&self, names: &[String]) -> Result<Vec<LoadRequest>> {
        if names.is_empty() {
            return Ok(self.modules.clone());
        }

        names
            .iter()
            .map(|name| {
                self.modules
                    .iter()
                    .find(|m| m.name.matches(name))
                    .cloned()
                    .with_context(|| format!("Module '{name}' is not in the configuration"))
            })
            .collect()
    }
}

/// Expand `~` and environment variables in a path
pub fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&*raw).unwrap_or(Cow::Borrowed(&*raw));
    PathBuf::from(expanded.into_owned())
}

//! Host facts: init system and distribution family.

use crate::error::Result;
use crate::types::{DistributionFamily, HostProfile, InitSystem};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Supplies the host profile at the start of a run.
pub trait FactsProvider: Send + Sync {
    fn host_profile(&self) -> Result<HostProfile>;
}

/// A fixed profile, from configuration or a test.
#[derive(Debug, Clone, Copy)]
pub struct StaticFacts(pub HostProfile);

impl FactsProvider for StaticFacts {
    fn host_profile(&self) -> Result<HostProfile> {
        Ok(self.0)
    }
}

/// Facts read from the running host.
#[derive(Debug, Clone)]
pub struct SystemFacts {
    /// Directory that exists only while systemd is PID 1
    pub systemd_marker: PathBuf,
    /// os-release files, first existing one wins
    pub os_release: Vec<PathBuf>,
}

impl Default for SystemFacts {
    fn default() -> Self {
        Self {
            systemd_marker: PathBuf::from("/run/systemd/system"),
            os_release: vec![
                PathBuf::from("/etc/os-release"),
                PathBuf::from("/usr/lib/os-release"),
            ],
        }
    }
}

impl SystemFacts {
    pub fn init_system(&self) -> InitSystem {
        if self.systemd_marker.is_dir() {
            InitSystem::Systemd
        } else {
            InitSystem::Other
        }
    }

    pub fn family(&self) -> Result<DistributionFamily> {
        for path in &self.os_release {
            match fs::read_to_string(path) {
                Ok(content) => {
                    log::debug!("reading distribution from {}", path.display());
                    return Ok(family_from_os_release(&parse_os_release(&content)));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        log::debug!("no os-release file found");
        Ok(DistributionFamily::Other)
    }
}

impl FactsProvider for SystemFacts {
    fn host_profile(&self) -> Result<HostProfile> {
        Ok(HostProfile::new(self.init_system(), self.family()?))
    }
}

/// Parse `KEY=value` lines, dropping comments and surrounding quotes.
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Map `ID` and then each `ID_LIKE` entry to a family.
pub fn family_from_os_release(fields: &HashMap<String, String>) -> DistributionFamily {
    let id = fields.get("ID").map(String::as_str).unwrap_or_default();
    let like = fields.get("ID_LIKE").map(String::as_str).unwrap_or_default();

    std::iter::once(id)
        .chain(like.split_whitespace())
        .find_map(family_for_id)
        .unwrap_or(DistributionFamily::Other)
}

fn family_for_id(id: &str) -> Option<DistributionFamily> {
    match id.to_ascii_lowercase().as_str() {
        "debian" | "ubuntu" => Some(DistributionFamily::Debian),
        "suse" | "opensuse" | "sles" => Some(DistributionFamily::Suse),
        "rhel" | "fedora" | "centos" | "rocky" | "almalinux" => Some(DistributionFamily::RedHat),
        id if id.starts_with("opensuse") => Some(DistributionFamily::Suse),
        _ => None,
    }
}

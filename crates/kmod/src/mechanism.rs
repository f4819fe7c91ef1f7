//! Persistence mechanism selection.

use crate::backend::Lens;
use crate::error::{Error, Result};
use crate::types::{DistributionFamily, HostProfile, InitSystem};
use serde::Serialize;
use std::fmt;

/// How a structured edit adds and removes a module entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStyle {
    /// `clear '<name>'` / `rm '<name>'`
    ClearByName,
    /// `set <list>/value[.='<name>'] '<name>'` / `rm <list>/value[.='<name>']`
    SetByValueMatch,
}

/// Strategy for persisting module load intent across reboots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mechanism {
    /// One file per module under `/etc/modules-load.d`
    UnitFile,
    /// An entry in a user supplied structured config file
    StructuredEdit { lens: Lens, style: ChangeStyle },
    /// One executable script per module under `/etc/sysconfig/modules`
    ScriptFile,
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnitFile => f.write_str("unit file (/etc/modules-load.d)"),
            Self::StructuredEdit { lens, .. } => write!(f, "structured edit (lens {lens})"),
            Self::ScriptFile => f.write_str("script file (/etc/sysconfig/modules)"),
        }
    }
}

/// Select the persistence mechanism for a host.
///
/// systemd owns module loading host-wide, so it wins over the family.
pub fn select(profile: &HostProfile) -> Result<Mechanism> {
    let mechanism = match (profile.init_system, profile.family) {
        (InitSystem::Systemd, _) => Mechanism::UnitFile,
        (InitSystem::Other, DistributionFamily::Debian) => Mechanism::StructuredEdit {
            lens: Lens::Modules,
            style: ChangeStyle::ClearByName,
        },
        (InitSystem::Other, DistributionFamily::Suse) => Mechanism::StructuredEdit {
            lens: Lens::ShellVarsList,
            style: ChangeStyle::SetByValueMatch,
        },
        (InitSystem::Other, DistributionFamily::RedHat) => Mechanism::ScriptFile,
        (InitSystem::Other, DistributionFamily::Other) => {
            return Err(Error::UnsupportedPlatform { profile: *profile });
        }
    };
    log::debug!("host {profile}: persisting through {mechanism}");
    Ok(mechanism)
}

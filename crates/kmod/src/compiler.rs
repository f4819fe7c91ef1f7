//! Desired state compilation.
//!
//! Turns a request plus the selected mechanism into a load guard operation
//! and a persistence artifact. Compilation is pure: it reads nothing from
//! the host and the same inputs always give the same output.

use crate::backend::Lens;
use crate::error::{Error, Result};
use crate::mechanism::{ChangeStyle, Mechanism};
use crate::types::{
    DistributionFamily, EnsureState, FileAttributes, LoadRequest, ModuleName, PermissionPolicy,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name written into the marker comment of managed files.
pub const TOOL_NAME: &str = "kmodctl";

/// Directory systemd reads module load lists from.
pub const UNIT_DIR: &str = "/etc/modules-load.d";

/// Directory RedHat init scripts run module scripts from.
pub const SCRIPT_DIR: &str = "/etc/sysconfig/modules";

/// Program used to load and unload modules.
pub const MODPROBE: &str = "modprobe";

/// Shell list variable holding boot-time modules on Suse.
const SUSE_VARIABLE: &str = "MODULES_LOADED_ON_BOOT";

/// Condition on live module state under which the guard command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPredicate {
    NotLoaded,
    Loaded,
}

impl GuardPredicate {
    pub fn holds(&self, loaded: bool) -> bool {
        match self {
            Self::NotLoaded => !loaded,
            Self::Loaded => loaded,
        }
    }
}

impl fmt::Display for GuardPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => f.write_str("not loaded"),
            Self::Loaded => f.write_str("loaded"),
        }
    }
}

/// Immediate load or unload, run only while its guard holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadGuardOperation {
    pub name: ModuleName,
    pub ensure: EnsureState,
    pub guard: GuardPredicate,
}

impl LoadGuardOperation {
    pub fn program(&self) -> &'static str {
        MODPROBE
    }

    /// Arguments for `modprobe`; the name always follows `--`.
    pub fn args(&self) -> Vec<&str> {
        match self.ensure {
            EnsureState::Present => vec!["--", self.name.as_str()],
            EnsureState::Absent => vec!["-r", "--", self.name.as_str()],
        }
    }
}

impl fmt::Display for LoadGuardOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ensure {
            EnsureState::Present => write!(f, "{} {}", self.program(), self.name),
            EnsureState::Absent => write!(f, "{} -r {}", self.program(), self.name),
        }
    }
}

/// A whole file owned by this tool.
///
/// The content is the same whatever `ensure` is; `ensure` decides whether
/// the file should exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileArtifact {
    pub path: PathBuf,
    pub content: String,
    pub attributes: FileAttributes,
    pub ensure: EnsureState,
}

/// One change to a structured config file shared with other owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditArtifact {
    pub target: PathBuf,
    pub lens: Lens,
    pub change: String,
    /// Ownership and mode enforced on the target file
    pub attributes: FileAttributes,
    /// Whether the change adds or removes the entry
    pub ensure: EnsureState,
}

/// What persists a module across reboots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistenceArtifact {
    UnitFile(FileArtifact),
    StructuredEdit(EditArtifact),
    ScriptFile(FileArtifact),
}

impl PersistenceArtifact {
    /// Path the artifact writes to, also its lock key.
    pub fn path(&self) -> &Path {
        match self {
            Self::UnitFile(file) | Self::ScriptFile(file) => &file.path,
            Self::StructuredEdit(edit) => &edit.target,
        }
    }

    pub fn attributes(&self) -> &FileAttributes {
        match self {
            Self::UnitFile(file) | Self::ScriptFile(file) => &file.attributes,
            Self::StructuredEdit(edit) => &edit.attributes,
        }
    }
}

/// Persistence step of a compiled module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    Artifact(PersistenceArtifact),
    /// No mechanism exists for the host; only the load guard runs
    Unsupported { reason: String },
}

/// Everything one request compiles to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledModule {
    pub request: LoadRequest,
    pub guard: LoadGuardOperation,
    pub persistence: Persistence,
}

impl CompiledModule {
    pub fn artifact(&self) -> Option<&PersistenceArtifact> {
        match &self.persistence {
            Persistence::Artifact(artifact) => Some(artifact),
            Persistence::Unsupported { .. } => None,
        }
    }
}

/// Guard operation for a module; independent of the mechanism.
pub fn compile_guard(name: &ModuleName, ensure: EnsureState) -> LoadGuardOperation {
    let guard = match ensure {
        EnsureState::Present => GuardPredicate::NotLoaded,
        EnsureState::Absent => GuardPredicate::Loaded,
    };
    LoadGuardOperation {
        name: name.clone(),
        ensure,
        guard,
    }
}

/// Persistence artifact for a request under a mechanism.
pub fn compile_artifact(
    request: &LoadRequest,
    mechanism: Mechanism,
    policy: &PermissionPolicy,
) -> Result<PersistenceArtifact> {
    let name = &request.name;

    let artifact = match mechanism {
        Mechanism::UnitFile => PersistenceArtifact::UnitFile(FileArtifact {
            path: unit_file_path(name),
            content: unit_file_content(name),
            attributes: policy.file_attributes(),
            ensure: request.ensure,
        }),
        Mechanism::ScriptFile => PersistenceArtifact::ScriptFile(FileArtifact {
            path: script_file_path(name),
            content: script_content(name),
            attributes: policy.exec_attributes(),
            ensure: request.ensure,
        }),
        Mechanism::StructuredEdit { lens, style } => {
            let target = request.target_file.clone().ok_or_else(|| {
                let family = match lens {
                    Lens::Modules => DistributionFamily::Debian,
                    Lens::ShellVarsList => DistributionFamily::Suse,
                };
                Error::MissingTargetFile {
                    module: name.to_string(),
                    family,
                }
            })?;
            PersistenceArtifact::StructuredEdit(EditArtifact {
                target,
                lens,
                change: change_expression(name, style, request.ensure),
                attributes: policy.file_attributes(),
                ensure: request.ensure,
            })
        }
    };
    Ok(artifact)
}

/// Compile a request against the outcome of mechanism selection.
///
/// An unsupported platform still yields a guard operation; a missing target
/// file fails the whole module.
pub fn compile(
    request: &LoadRequest,
    selection: Result<Mechanism>,
    policy: &PermissionPolicy,
) -> Result<CompiledModule> {
    let persistence = match selection {
        Ok(mechanism) => Persistence::Artifact(compile_artifact(request, mechanism, policy)?),
        Err(err @ Error::UnsupportedPlatform { .. }) => Persistence::Unsupported {
            reason: err.to_string(),
        },
        Err(err) => return Err(err),
    };

    Ok(CompiledModule {
        request: request.clone(),
        guard: compile_guard(&request.name, request.ensure),
        persistence,
    })
}

pub fn unit_file_path(name: &ModuleName) -> PathBuf {
    Path::new(UNIT_DIR).join(format!("{name}.conf"))
}

pub fn script_file_path(name: &ModuleName) -> PathBuf {
    Path::new(SCRIPT_DIR).join(format!("{name}.modules"))
}

fn marker() -> String {
    format!("# This file is managed by {TOOL_NAME}.")
}

pub fn unit_file_content(name: &ModuleName) -> String {
    format!("{}\n{name}\n", marker())
}

/// Boot script loading the module unless the kernel already lists it.
pub fn script_content(name: &ModuleName) -> String {
    format!(
        "#!/bin/sh\n{}\n\nif ! grep -qE '^{} ' /proc/modules; then\n    exec /sbin/modprobe {name} > /dev/null 2>&1\nfi\n",
        marker(),
        name.canonical(),
    )
}

pub fn change_expression(name: &ModuleName, style: ChangeStyle, ensure: EnsureState) -> String {
    match (style, ensure) {
        (ChangeStyle::ClearByName, EnsureState::Present) => format!("clear '{name}'"),
        (ChangeStyle::ClearByName, EnsureState::Absent) => format!("rm '{name}'"),
        (ChangeStyle::SetByValueMatch, EnsureState::Present) => {
            format!("set {SUSE_VARIABLE}/value[.='{name}'] '{name}'")
        }
        (ChangeStyle::SetByValueMatch, EnsureState::Absent) => {
            format!("rm {SUSE_VARIABLE}/value[.='{name}']")
        }
    }
}

//! Managed file resource - unit files and boot scripts owned by kmodctl

use anyhow::{Context, Result};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::backend::Collaborators;
use crate::compiler::FileArtifact;
use crate::types::EnsureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    UnitFile,
    ScriptFile,
}

/// A whole file whose content, ownership and mode are ours
#[derive(Debug, Clone)]
pub struct ManagedFile {
    pub artifact: FileArtifact,
    kind: FileKind,
    collaborators: Collaborators,
}

/// What is on disk now
enum OnDisk {
    Missing,
    Matching,
    Differs { from: String },
}

impl ManagedFile {
    pub fn unit_file(artifact: FileArtifact, collaborators: Collaborators) -> Self {
        Self {
            artifact,
            kind: FileKind::UnitFile,
            collaborators,
        }
    }

    pub fn script_file(artifact: FileArtifact, collaborators: Collaborators) -> Self {
        Self {
            artifact,
            kind: FileKind::ScriptFile,
            collaborators,
        }
    }

    fn inspect(&self) -> Result<OnDisk> {
        let path = &self.artifact.path;
        let files = &self.collaborators.files;

        let Some(content) = files.read_file(path)? else {
            return Ok(OnDisk::Missing);
        };
        if self.artifact.ensure == EnsureState::Absent {
            // Only existence matters for a file being removed
            return Ok(OnDisk::Matching);
        }
        let attributes = files.attributes(path)?;

        let content_matches = content == self.artifact.content;
        let attributes_match = match &attributes {
            Some(current) => files.attributes_match(current, &self.artifact.attributes)?,
            None => false,
        };
        if content_matches && attributes_match {
            return Ok(OnDisk::Matching);
        }

        let attributes = attributes.map_or_else(|| "unknown".to_string(), |a| a.to_string());
        let from = if content_matches {
            attributes
        } else {
            format!("{attributes}, different content")
        };
        Ok(OnDisk::Differs { from })
    }

    fn write(&self) -> Result<()> {
        self.collaborators
            .files
            .write_file(
                &self.artifact.path,
                &self.artifact.content,
                &self.artifact.attributes,
            )
            .with_context(|| format!("Failed to write {}", self.artifact.path.display()))
    }
}

impl Resource for ManagedFile {
    fn id(&self) -> String {
        format!("file:{}", self.artifact.path.display())
    }

    fn description(&self) -> String {
        let what = match self.kind {
            FileKind::UnitFile => "module list",
            FileKind::ScriptFile => "boot script",
        };
        match self.artifact.ensure {
            EnsureState::Present => format!("Write {what} {}", self.artifact.path.display()),
            EnsureState::Absent => format!("Remove {what} {}", self.artifact.path.display()),
        }
    }

    fn resource_type(&self) -> &'static str {
        match self.kind {
            FileKind::UnitFile => "modules_load_file",
            FileKind::ScriptFile => "sysconfig_script",
        }
    }

    fn lock_key(&self) -> Option<String> {
        Some(self.artifact.path.display().to_string())
    }

    fn current_state(&self) -> Result<ResourceState> {
        match self.inspect()? {
            OnDisk::Missing => Ok(ResourceState::Absent),
            OnDisk::Matching => Ok(ResourceState::Present {
                details: Some(self.artifact.attributes.to_string()),
            }),
            OnDisk::Differs { from } => Ok(ResourceState::Modified {
                from,
                to: self.artifact.attributes.to_string(),
            }),
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.artifact.ensure {
            EnsureState::Present => ResourceState::Present {
                details: Some(self.artifact.attributes.to_string()),
            },
            EnsureState::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let on_disk = self.inspect()?;

        match (self.artifact.ensure, on_disk) {
            (EnsureState::Present, OnDisk::Matching) | (EnsureState::Absent, OnDisk::Missing) => {
                Ok(ApplyResult::Unchanged)
            }
            (EnsureState::Present, OnDisk::Missing) => {
                self.write()?;
                Ok(ApplyResult::Created)
            }
            (EnsureState::Present, OnDisk::Differs { .. }) => {
                self.write()?;
                Ok(ApplyResult::Modified)
            }
            (EnsureState::Absent, OnDisk::Matching | OnDisk::Differs { .. }) => {
                self.collaborators
                    .files
                    .delete_file(&self.artifact.path)
                    .with_context(|| {
                        format!("Failed to remove {}", self.artifact.path.display())
                    })?;
                Ok(ApplyResult::Removed)
            }
        }
    }
}

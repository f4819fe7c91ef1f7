//! Structured edit resource - one module entry in a shared config file

use anyhow::{Context, Result};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::backend::Collaborators;
use crate::compiler::EditArtifact;
use crate::types::{EnsureState, ModuleName};

/// Adds or removes a module entry through a lens, leaving the rest of the
/// file alone
#[derive(Debug, Clone)]
pub struct StructuredEdit {
    pub module: ModuleName,
    pub artifact: EditArtifact,
    collaborators: Collaborators,
}

impl StructuredEdit {
    pub fn new(module: ModuleName, artifact: EditArtifact, collaborators: Collaborators) -> Self {
        Self {
            module,
            artifact,
            collaborators,
        }
    }

    fn entry(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(format!("'{}' listed", self.module)),
        }
    }
}

impl Resource for StructuredEdit {
    fn id(&self) -> String {
        format!("augeas:{}:{}", self.artifact.target.display(), self.module)
    }

    fn description(&self) -> String {
        format!(
            "Apply \"{}\" to {} ({})",
            self.artifact.change,
            self.artifact.target.display(),
            self.artifact.lens
        )
    }

    fn resource_type(&self) -> &'static str {
        "augeas"
    }

    fn lock_key(&self) -> Option<String> {
        Some(self.artifact.target.display().to_string())
    }

    fn current_state(&self) -> Result<ResourceState> {
        let converged = !self.needs_apply()?;
        let listed = match self.artifact.ensure {
            EnsureState::Present => converged,
            EnsureState::Absent => !converged,
        };
        Ok(if listed {
            self.entry()
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        match self.artifact.ensure {
            EnsureState::Present => self.entry(),
            EnsureState::Absent => ResourceState::Absent,
        }
    }

    fn needs_apply(&self) -> Result<bool> {
        let needed = self.collaborators.editor.needs_change(
            &self.artifact.target,
            self.artifact.lens,
            &self.artifact.change,
        )?;
        Ok(needed)
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if !self.needs_apply()? {
            return Ok(ApplyResult::Unchanged);
        }

        self.collaborators
            .editor
            .apply_change(
                &self.artifact.target,
                self.artifact.lens,
                &self.artifact.change,
            )
            .with_context(|| {
                format!(
                    "Failed to edit {} for module {}",
                    self.artifact.target.display(),
                    self.module
                )
            })?;

        Ok(ApplyResult::Modified)
    }
}

//! Load guard resource - modprobe gated by live module state

use anyhow::{Result, bail};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::backend::Collaborators;
use crate::compiler::LoadGuardOperation;
use crate::probe::StateProbe;
use crate::types::EnsureState;

/// Loads or unloads a module now, only when its guard holds
#[derive(Debug, Clone)]
pub struct LoadGuard {
    pub operation: LoadGuardOperation,
    collaborators: Collaborators,
}

impl LoadGuard {
    pub fn new(operation: LoadGuardOperation, collaborators: Collaborators) -> Self {
        Self {
            operation,
            collaborators,
        }
    }

    fn probe(&self) -> StateProbe {
        StateProbe::new(self.collaborators.modules.clone())
    }
}

impl Resource for LoadGuard {
    fn id(&self) -> String {
        format!("load:{}", self.operation.name)
    }

    fn description(&self) -> String {
        match self.operation.ensure {
            EnsureState::Present => format!("Load module {}", self.operation.name),
            EnsureState::Absent => format!("Unload module {}", self.operation.name),
        }
    }

    fn resource_type(&self) -> &'static str {
        "kmod_load"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.probe().is_loaded(&self.operation.name)? {
            Ok(ResourceState::Present {
                details: Some("loaded".to_string()),
            })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.operation.ensure {
            EnsureState::Present => ResourceState::Present {
                details: Some("loaded".to_string()),
            },
            EnsureState::Absent => ResourceState::Absent,
        }
    }

    fn needs_apply(&self) -> Result<bool> {
        let loaded = self.probe().is_loaded(&self.operation.name)?;
        Ok(self.operation.guard.holds(loaded))
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if !self.needs_apply()? {
            return Ok(ApplyResult::Unchanged);
        }

        let output = self
            .collaborators
            .executor
            .run(self.operation.program(), &self.operation.args())?;

        if !output.success {
            let code = output
                .code
                .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
            bail!(
                "{} exited with {}: {}",
                self.operation,
                code,
                output.stderr_str().trim()
            );
        }

        let stdout = output.stdout_str();
        if ctx.verbose && !stdout.trim().is_empty() {
            log::info!("{}: {}", self.operation, stdout.trim());
        }

        Ok(ApplyResult::Executed {
            command: self.operation.to_string(),
        })
    }
}

//! Ownership and mode of an existing config file

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::backend::Collaborators;
use crate::types::FileAttributes;

/// Enforces owner, group and mode on a file this tool edits but does not own.
///
/// A missing file is left alone: there is nothing to own yet.
#[derive(Debug, Clone)]
pub struct FileOwnership {
    pub path: PathBuf,
    pub attributes: FileAttributes,
    collaborators: Collaborators,
}

impl FileOwnership {
    pub fn new(path: PathBuf, attributes: FileAttributes, collaborators: Collaborators) -> Self {
        Self {
            path,
            attributes,
            collaborators,
        }
    }

    fn desired(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.attributes.to_string()),
        }
    }
}

impl Resource for FileOwnership {
    fn id(&self) -> String {
        format!("attributes:{}", self.path.display())
    }

    fn description(&self) -> String {
        format!("Set {} on {}", self.attributes, self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "file_attributes"
    }

    fn lock_key(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }

    fn current_state(&self) -> Result<ResourceState> {
        let files = &self.collaborators.files;
        match files.attributes(&self.path)? {
            None => Ok(ResourceState::Absent),
            Some(current) => {
                if files.attributes_match(&current, &self.attributes)? {
                    return Ok(self.desired());
                }
                Ok(ResourceState::Modified {
                    from: current.to_string(),
                    to: self.attributes.to_string(),
                })
            }
        }
    }

    fn desired_state(&self) -> ResourceState {
        self.desired()
    }

    fn needs_apply(&self) -> Result<bool> {
        Ok(matches!(
            self.current_state()?,
            ResourceState::Modified { .. }
        ))
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if !self.needs_apply()? {
            return Ok(ApplyResult::Unchanged);
        }

        self.collaborators
            .files
            .set_attributes(&self.path, &self.attributes)
            .with_context(|| format!("Failed to set attributes of {}", self.path.display()))?;
        Ok(ApplyResult::Modified)
    }
}

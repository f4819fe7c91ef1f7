//! Backend abstraction for the host operations reconciliation depends on.
//!
//! The core never touches the kernel, the filesystem or config files
//! directly. It goes through these traits, enabling:
//! - Real execution against the running host ([`system`])
//! - In-memory fakes for testing

#[cfg(test)]
pub mod memory;
pub mod system;

use crate::error::Result;
use crate::types::FileAttributes;
use declarative::CommandOutput;
use std::path::Path;
use std::sync::Arc;

/// Source of the live kernel module list.
pub trait ModuleList: Send + Sync {
    /// Raw module listing, one module per line, name first.
    ///
    /// Fails with `ProbeUnavailable` when the listing cannot be read.
    fn read_listing(&self) -> Result<String>;

    /// Names of the loaded modules, as listed.
    fn list_loaded(&self) -> Result<Vec<String>> {
        Ok(crate::probe::parse_listing(&self.read_listing()?))
    }
}

/// Runs module load/unload commands.
pub trait CommandExecutor: Send + Sync {
    /// Run a program with arguments and capture its output.
    ///
    /// A non-zero exit is reported in the output, not as an error. Errors
    /// mean the program could not be run at all.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Reads, writes and deletes managed files.
pub trait FileStore: Send + Sync {
    /// Read a file, `None` if it does not exist.
    fn read_file(&self, path: &Path) -> Result<Option<String>>;

    /// Write a file and set its ownership and mode, creating parent directories.
    fn write_file(&self, path: &Path, content: &str, attributes: &FileAttributes) -> Result<()>;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Current ownership and mode, `None` if the file does not exist.
    fn attributes(&self, path: &Path) -> Result<Option<FileAttributes>>;

    /// Set ownership and mode of an existing file.
    fn set_attributes(&self, path: &Path, attributes: &FileAttributes) -> Result<()>;

    /// Whether a file with `current` attributes already has the `desired` ones.
    ///
    /// Stores that accept numeric owners and groups compare resolved ids.
    fn attributes_match(&self, current: &FileAttributes, desired: &FileAttributes) -> Result<bool> {
        Ok(current == desired)
    }
}

/// Lens-based structured config editor (augeas semantics).
///
/// Reapplying a change that is already in effect must be a no-op.
pub trait ConfigEditor: Send + Sync {
    /// Whether applying `change` would modify `target`.
    fn needs_change(&self, target: &Path, lens: Lens, change: &str) -> Result<bool>;

    /// Apply `change` to `target` through `lens`.
    fn apply_change(&self, target: &Path, lens: Lens, change: &str) -> Result<()>;
}

/// Schema used to parse and edit a structured config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Lens {
    /// `/etc/modules` style: one module per line
    Modules,
    /// Shell variables holding whitespace separated lists
    ShellVarsList,
}

impl Lens {
    /// Name of the augeas lens module.
    pub fn augeas_lens(&self) -> &'static str {
        match self {
            Self::Modules => "Modules.lns",
            Self::ShellVarsList => "Shellvars_list.lns",
        }
    }
}

impl std::fmt::Display for Lens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Modules => f.write_str("Modules"),
            Self::ShellVarsList => f.write_str("ShellVarsList"),
        }
    }
}

/// The full set of collaborators a reconciler works through.
#[derive(Clone)]
pub struct Collaborators {
    pub modules: Arc<dyn ModuleList>,
    pub executor: Arc<dyn CommandExecutor>,
    pub files: Arc<dyn FileStore>,
    pub editor: Arc<dyn ConfigEditor>,
}

impl Collaborators {
    /// Collaborators acting on the running host.
    pub fn system() -> Self {
        Self {
            modules: Arc::new(system::ProcModules::default()),
            executor: Arc::new(system::SystemExecutor),
            files: Arc::new(system::SystemFileStore),
            editor: Arc::new(system::AugtoolEditor::default()),
        }
    }

    /// Use one object for every collaborator.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: ModuleList + CommandExecutor + FileStore + ConfigEditor + 'static,
    {
        Self {
            modules: host.clone(),
            executor: host.clone(),
            files: host.clone(),
            editor: host,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

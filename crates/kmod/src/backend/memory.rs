//! In-memory host used by tests.
//!
//! Loaded modules, files and structured config entries live in one
//! mutex-guarded state, so `modprobe` calls and file writes are visible to
//! later probes exactly as they would be on a real host.

use crate::backend::{CommandExecutor, ConfigEditor, FileStore, Lens, ModuleList};
use crate::error::{Error, Result};
use crate::types::FileAttributes;
use declarative::CommandOutput;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryState {
    /// Canonical names of loaded modules
    pub loaded: BTreeSet<String>,
    pub files: BTreeMap<PathBuf, (String, FileAttributes)>,
    /// Entries present in each structured config file
    pub entries: BTreeMap<PathBuf, BTreeSet<String>>,
    /// Every command line run, in order
    pub commands: Vec<String>,
    /// Every structured change applied, in order
    pub edits: Vec<(PathBuf, Lens, String)>,
    pub probe_unavailable: bool,
    pub fail_commands: bool,
    pub fail_writes: bool,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loaded(modules: &[&str]) -> Self {
        let host = Self::new();
        host.state().loaded = modules.iter().map(|m| m.replace('-', "_")).collect();
        host
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state().loaded.contains(&name.replace('-', "_"))
    }

    pub fn file(&self, path: &str) -> Option<(String, FileAttributes)> {
        self.state().files.get(Path::new(path)).cloned()
    }

    pub fn entries(&self, path: &str) -> BTreeSet<String> {
        self.state()
            .entries
            .get(Path::new(path))
            .cloned()
            .unwrap_or_default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }
}

impl ModuleList for MemoryHost {
    fn read_listing(&self) -> Result<String> {
        let state = self.state();
        if state.probe_unavailable {
            return Err(Error::ProbeUnavailable {
                source_name: "memory".to_string(),
                message: "listing disabled".to_string(),
            });
        }
        Ok(state
            .loaded
            .iter()
            .map(|name| format!("{name} 16384 0 - Live 0x0000000000000000\n"))
            .collect())
    }
}

impl CommandExecutor for MemoryHost {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut state = self.state();
        state.commands.push(format!("{} {}", program, args.join(" ")));

        if state.fail_commands {
            return Ok(CommandOutput::failed(1, "simulated failure"));
        }

        match (program, args) {
            ("modprobe", ["-r", "--", name]) => {
                state.loaded.remove(&name.replace('-', "_"));
                Ok(CommandOutput::ok())
            }
            ("modprobe", ["--", name]) => {
                state.loaded.insert(name.replace('-', "_"));
                Ok(CommandOutput::ok())
            }
            _ => Ok(CommandOutput::failed(127, "command not found")),
        }
    }
}

impl FileStore for MemoryHost {
    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.state().files.get(path).map(|(content, _)| content.clone()))
    }

    fn write_file(&self, path: &Path, content: &str, attributes: &FileAttributes) -> Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(Error::collaborator(
                format!("write {}", path.display()),
                "read-only filesystem",
            ));
        }
        state
            .files
            .insert(path.to_path_buf(), (content.to_string(), attributes.clone()));
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.state().files.remove(path);
        Ok(())
    }

    fn attributes(&self, path: &Path) -> Result<Option<FileAttributes>> {
        Ok(self.state().files.get(path).map(|(_, attrs)| attrs.clone()))
    }

    fn set_attributes(&self, path: &Path, attributes: &FileAttributes) -> Result<()> {
        let mut state = self.state();
        match state.files.get_mut(path) {
            Some((_, attrs)) => {
                *attrs = attributes.clone();
                Ok(())
            }
            None => Err(Error::collaborator(
                format!("set attributes of {}", path.display()),
                "no such file",
            )),
        }
    }
}

/// Name a change expression refers to: the last single-quoted token.
fn quoted_name(change: &str) -> Option<&str> {
    let end = change.rfind('\'')?;
    let start = change[..end].rfind('\'')?;
    Some(&change[start + 1..end])
}

impl ConfigEditor for MemoryHost {
    fn needs_change(&self, target: &Path, _lens: Lens, change: &str) -> Result<bool> {
        let name = quoted_name(change)
            .ok_or_else(|| Error::collaborator("parse change", change.to_string()))?;
        let present = self
            .state()
            .entries
            .get(target)
            .is_some_and(|entries| entries.contains(name));
        Ok(present == change.starts_with("rm "))
    }

    fn apply_change(&self, target: &Path, lens: Lens, change: &str) -> Result<()> {
        let name = quoted_name(change)
            .ok_or_else(|| Error::collaborator("parse change", change.to_string()))?;

        let mut state = self.state();
        if state.fail_writes {
            return Err(Error::collaborator(
                format!("augeas edit of {}", target.display()),
                "read-only filesystem",
            ));
        }
        state
            .edits
            .push((target.to_path_buf(), lens, change.to_string()));

        let entries = state.entries.entry(target.to_path_buf()).or_default();
        if change.starts_with("rm ") {
            entries.remove(name);
        } else {
            entries.insert(name.to_string());
        }

        // Saving through augeas creates the file if it did not exist
        state
            .files
            .entry(target.to_path_buf())
            .or_insert_with(|| (String::new(), FileAttributes::new("root", "root", 0o644)));
        Ok(())
    }
}

//! Backends acting on the running host: `/proc/modules`, `modprobe`,
//! the local filesystem and `augtool`.

use crate::backend::{CommandExecutor, ConfigEditor, FileStore, Lens, ModuleList};
use crate::error::{Error, Result};
use crate::types::FileAttributes;
use declarative::CommandOutput;
use std::ffi::{CStr, CString};
use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Reads the kernel's live module registry.
#[derive(Debug, Clone)]
pub struct ProcModules {
    path: PathBuf,
}

impl ProcModules {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcModules {
    fn default() -> Self {
        Self::new("/proc/modules")
    }
}

impl ModuleList for ProcModules {
    fn read_listing(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| Error::ProbeUnavailable {
            source_name: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("running {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output().map_err(|e| {
            Error::collaborator(
                format!("{} {}", program, args.join(" ")),
                format!("failed to execute: {e}"),
            )
        })?;
        Ok(output.into())
    }
}

/// Local filesystem with numeric ownership resolved through the user database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFileStore;

impl FileStore for SystemFileStore {
    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::collaborator(
                format!("read {}", path.display()),
                e.to_string(),
            )),
        }
    }

    /// Ownership is resolved before anything is written. The content goes to
    /// a staging file next to `path` and is renamed into place only once its
    /// owner and mode are set, so a failure never leaves a partial file.
    fn write_file(&self, path: &Path, content: &str, attributes: &FileAttributes) -> Result<()> {
        let operation = || format!("write {}", path.display());

        let uid = user_id(&attributes.owner)?;
        let gid = group_id(&attributes.group)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::collaborator(operation(), e.to_string()))?;
        }

        let staging = staging_path(path);
        let written = fs::write(&staging, content)
            .map_err(|e| Error::collaborator(operation(), e.to_string()))
            .and_then(|()| chown_chmod(&staging, uid, gid, attributes.mode))
            .and_then(|()| {
                fs::rename(&staging, path).map_err(|e| Error::collaborator(operation(), e.to_string()))
            });

        if written.is_err() {
            let _ = fs::remove_file(&staging);
        }
        written
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::collaborator(
                format!("delete {}", path.display()),
                e.to_string(),
            )),
        }
    }

    fn attributes(&self, path: &Path) -> Result<Option<FileAttributes>> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::collaborator(
                    format!("stat {}", path.display()),
                    e.to_string(),
                ));
            }
        };

        Ok(Some(FileAttributes {
            owner: user_name(metadata.uid()),
            group: group_name(metadata.gid()),
            mode: metadata.permissions().mode() & 0o7777,
        }))
    }

    fn set_attributes(&self, path: &Path, attributes: &FileAttributes) -> Result<()> {
        let uid = user_id(&attributes.owner)?;
        let gid = group_id(&attributes.group)?;
        chown_chmod(path, uid, gid, attributes.mode)
    }

    fn attributes_match(&self, current: &FileAttributes, desired: &FileAttributes) -> Result<bool> {
        Ok(current.mode == desired.mode
            && user_id(&current.owner)? == user_id(&desired.owner)?
            && group_id(&current.group)? == group_id(&desired.group)?)
    }
}

/// Hidden sibling of `path` that a write is staged in.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "kmodctl".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

fn chown_chmod(path: &Path, uid: u32, gid: u32, mode: u32) -> Result<()> {
    let operation = || format!("set attributes of {}", path.display());

    std::os::unix::fs::chown(path, Some(uid), Some(gid))
        .map_err(|e| Error::collaborator(operation(), e.to_string()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::collaborator(operation(), e.to_string()))
}

const LOOKUP_BUFFER: usize = 16 * 1024;

/// Resolve a user name (or numeric id) to a uid.
fn user_id(name: &str) -> Result<u32> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok(uid);
    }
    let unknown = || Error::collaborator("resolve owner", format!("unknown user '{name}'"));
    let cname = CString::new(name).map_err(|_| unknown())?;

    let mut buf = vec![0 as libc::c_char; LOOKUP_BUFFER];
    // SAFETY: passwd is plain old data; getpwnam_r fills it and points its
    // string fields into `buf`, which outlives every read below.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut found: *mut libc::passwd = std::ptr::null_mut();
    let rc = unsafe {
        libc::getpwnam_r(cname.as_ptr(), &mut pwd, buf.as_mut_ptr(), buf.len(), &mut found)
    };
    if rc != 0 || found.is_null() {
        return Err(unknown());
    }
    Ok(pwd.pw_uid)
}

/// Resolve a group name (or numeric id) to a gid.
fn group_id(name: &str) -> Result<u32> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }
    let unknown = || Error::collaborator("resolve group", format!("unknown group '{name}'"));
    let cname = CString::new(name).map_err(|_| unknown())?;

    let mut buf = vec![0 as libc::c_char; LOOKUP_BUFFER];
    // SAFETY: as in `user_id`, for the group database.
    let mut grp: libc::group = unsafe { std::mem::zeroed() };
    let mut found: *mut libc::group = std::ptr::null_mut();
    let rc = unsafe {
        libc::getgrnam_r(cname.as_ptr(), &mut grp, buf.as_mut_ptr(), buf.len(), &mut found)
    };
    if rc != 0 || found.is_null() {
        return Err(unknown());
    }
    Ok(grp.gr_gid)
}

/// Name for a uid, or the number itself when it has no entry.
fn user_name(uid: u32) -> String {
    let mut buf = vec![0 as libc::c_char; LOOKUP_BUFFER];
    // SAFETY: see `user_id`; pw_name is only read while `buf` is alive.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut found: *mut libc::passwd = std::ptr::null_mut();
    let rc = unsafe { libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut found) };
    if rc != 0 || found.is_null() || pwd.pw_name.is_null() {
        return uid.to_string();
    }
    unsafe { CStr::from_ptr(pwd.pw_name) }
        .to_string_lossy()
        .into_owned()
}

/// Name for a gid, or the number itself when it has no entry.
fn group_name(gid: u32) -> String {
    let mut buf = vec![0 as libc::c_char; LOOKUP_BUFFER];
    // SAFETY: see `user_id`; gr_name is only read while `buf` is alive.
    let mut grp: libc::group = unsafe { std::mem::zeroed() };
    let mut found: *mut libc::group = std::ptr::null_mut();
    let rc = unsafe { libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut found) };
    if rc != 0 || found.is_null() || grp.gr_name.is_null() {
        return gid.to_string();
    }
    unsafe { CStr::from_ptr(grp.gr_name) }
        .to_string_lossy()
        .into_owned()
}

/// Structured edits through the `augtool` command line.
///
/// Only the lens for the target file is loaded. Relative change expressions
/// resolve against `/files<target>`, the same context a config manager's
/// augeas resource uses.
#[derive(Debug, Clone)]
pub struct AugtoolEditor {
    augtool: PathBuf,
}

impl AugtoolEditor {
    pub fn new(augtool: impl Into<PathBuf>) -> Self {
        Self {
            augtool: augtool.into(),
        }
    }

    /// Commands fed to augtool on stdin.
    pub fn script(target: &Path, change: &str) -> String {
        format!(
            "set /augeas/context /files{}\n{}\nsave\n",
            target.display(),
            change
        )
    }

    fn run(&self, target: &Path, lens: Lens, change: &str, new_file: bool) -> Result<()> {
        let operation = format!("augeas edit of {} ({change})", target.display());

        let mut command = Command::new(&self.augtool);
        command
            .arg("--noautoload")
            .arg("--transform")
            .arg(format!("{} incl {}", lens.augeas_lens(), target.display()));
        if new_file {
            command.arg("--new");
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::collaborator(&operation, format!("failed to execute augtool: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(Self::script(target, change).as_bytes())
                .map_err(|e| Error::collaborator(&operation, e.to_string()))?;
        }

        let output: CommandOutput = child
            .wait_with_output()
            .map_err(|e| Error::collaborator(&operation, e.to_string()))?
            .into();

        if !output.success {
            return Err(Error::collaborator(
                operation,
                format!(
                    "augtool exited with {}: {}",
                    output.code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    output.stderr_str().trim()
                ),
            ));
        }
        Ok(())
    }

    fn new_file_path(target: &Path) -> PathBuf {
        PathBuf::from(format!("{}.augnew", target.display()))
    }
}

impl Default for AugtoolEditor {
    fn default() -> Self {
        Self::new("augtool")
    }
}

impl ConfigEditor for AugtoolEditor {
    fn needs_change(&self, target: &Path, lens: Lens, change: &str) -> Result<bool> {
        let preview = Self::new_file_path(target);
        let _ = fs::remove_file(&preview);

        self.run(target, lens, change, true)?;

        // augtool only writes the .augnew copy when the tree changed
        let changed = preview.exists();
        if changed {
            fs::remove_file(&preview)?;
        }
        Ok(changed)
    }

    fn apply_change(&self, target: &Path, lens: Lens, change: &str) -> Result<()> {
        self.run(target, lens, change, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Collaborators;
    use crate::compiler::FileArtifact;
    use crate::resource::{ApplyContext, ApplyResult, FileOwnership, ManagedFile, Resource};
    use crate::types::EnsureState;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_proc_modules_reads_listing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modules");
        fs::write(
            &path,
            "foobar 16384 0 - Live 0x0000000000000000\nfoo 16384 1 foobar, Live 0x0000000000000000\n",
        )
        .unwrap();

        let modules = ProcModules::new(&path);
        assert_eq!(modules.list_loaded().unwrap(), ["foobar", "foo"]);
    }

    #[test]
    fn test_unreadable_proc_modules_is_reported() {
        let dir = TempDir::new().unwrap();
        let modules = ProcModules::new(dir.path().join("missing"));

        let err = modules.read_listing().unwrap_err();
        assert!(matches!(err, Error::ProbeUnavailable { .. }));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modules-load.d").join("foo.conf");
        let store = SystemFileStore;

        assert_eq!(store.read_file(&path).unwrap(), None);
        assert_eq!(store.attributes(&path).unwrap(), None);

        // Own uid/gid so the chown succeeds without privileges
        let meta = fs::metadata(dir.path()).unwrap();
        let attributes = FileAttributes::new(meta.uid().to_string(), meta.gid().to_string(), 0o600);
        store.write_file(&path, "foo\n", &attributes).unwrap();

        assert_eq!(store.read_file(&path).unwrap().as_deref(), Some("foo\n"));
        let current = store.attributes(&path).unwrap().unwrap();
        assert_eq!(current.mode, 0o600);

        store.delete_file(&path).unwrap();
        assert_eq!(store.read_file(&path).unwrap(), None);
        store.delete_file(&path).unwrap();
    }

    fn own_attributes(dir: &Path, mode: u32) -> FileAttributes {
        let meta = fs::metadata(dir).unwrap();
        FileAttributes::new(meta.uid().to_string(), meta.gid().to_string(), mode)
    }

    fn system_collaborators() -> Collaborators {
        Collaborators {
            modules: Arc::new(ProcModules::default()),
            executor: Arc::new(SystemExecutor),
            files: Arc::new(SystemFileStore),
            editor: Arc::new(AugtoolEditor::default()),
        }
    }

    #[test]
    fn test_numeric_owner_converges() {
        let dir = TempDir::new().unwrap();
        let artifact = FileArtifact {
            path: dir.path().join("foo.conf"),
            content: "# This file is managed by kmodctl.\nfoo\n".to_string(),
            attributes: own_attributes(dir.path(), 0o644),
            ensure: EnsureState::Present,
        };
        let file = ManagedFile::unit_file(artifact, system_collaborators());
        let mut ctx = ApplyContext::default();

        assert_eq!(file.apply(&mut ctx).unwrap(), ApplyResult::Created);
        assert!(!file.needs_apply().unwrap());
        assert_eq!(file.apply(&mut ctx).unwrap(), ApplyResult::Unchanged);
        assert_eq!(file.apply(&mut ctx).unwrap(), ApplyResult::Unchanged);
    }

    #[test]
    fn test_numeric_ownership_of_edited_file_converges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modules");
        let attributes = own_attributes(dir.path(), 0o600);
        SystemFileStore
            .write_file(&path, "loop\n", &attributes)
            .unwrap();

        let ownership = FileOwnership::new(path, attributes, system_collaborators());
        assert!(!ownership.needs_apply().unwrap());
        assert_eq!(
            ownership.apply(&mut ApplyContext::default()).unwrap(),
            ApplyResult::Unchanged
        );
    }

    #[test]
    fn test_attributes_match_resolves_ids() {
        let dir = TempDir::new().unwrap();
        let numeric = own_attributes(dir.path(), 0o644);
        let path = dir.path().join("foo.conf");
        SystemFileStore.write_file(&path, "foo\n", &numeric).unwrap();

        // As reported: names where the user database has them
        let current = SystemFileStore.attributes(&path).unwrap().unwrap();
        assert!(SystemFileStore.attributes_match(&current, &numeric).unwrap());

        let other_mode = FileAttributes { mode: 0o600, ..numeric };
        assert!(!SystemFileStore.attributes_match(&current, &other_mode).unwrap());
    }

    #[test]
    fn test_unknown_owner_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.modules");
        let attributes = FileAttributes::new("no-such-user-kmodctl", "root", 0o755);

        let err = SystemFileStore
            .write_file(&path, "#!/bin/sh\n", &attributes)
            .unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rewrite_leaves_no_staging_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.conf");
        let attributes = own_attributes(dir.path(), 0o644);

        SystemFileStore.write_file(&path, "old\n", &attributes).unwrap();
        SystemFileStore.write_file(&path, "new\n", &attributes).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unknown_owner_is_collaborator_error() {
        let err = user_id("no-such-user-kmodctl").unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
        assert_eq!(user_id("0").unwrap(), 0);
    }

    #[test]
    fn test_augtool_script() {
        let script = AugtoolEditor::script(Path::new("/etc/modules"), "clear 'foo'");
        assert_eq!(script, "set /augeas/context /files/etc/modules\nclear 'foo'\nsave\n");
    }

    #[test]
    fn test_missing_augtool_is_collaborator_error() {
        let editor = AugtoolEditor::new("/nonexistent/augtool");
        let err = editor
            .apply_change(Path::new("/tmp/x"), Lens::Modules, "clear 'foo'")
            .unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[test]
    fn test_executor_reports_exit_code() {
        let output = SystemExecutor.run("sh", &["-c", "exit 3"]).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
    }
}

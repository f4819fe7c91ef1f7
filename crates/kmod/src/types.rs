//! Core types: module names, ensure states, host profiles and permissions.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

static MODULE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").expect("module name pattern is valid"));

/// Name of a loadable kernel module.
///
/// The kernel treats `-` and `_` as the same character and always reports
/// names with underscores, so comparisons go through [`ModuleName::canonical`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleName(String);

impl ModuleName {
    /// Validate and wrap a module name.
    pub fn parse(name: &str) -> Result<Self> {
        if MODULE_NAME.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(Error::InvalidModuleName {
                name: name.to_string(),
            })
        }
    }

    /// The name as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as the kernel lists it.
    pub fn canonical(&self) -> String {
        canonicalize(&self.0)
    }

    /// Whether a name from the live module list refers to this module.
    pub fn matches(&self, listed: &str) -> bool {
        canonicalize(listed) == self.canonical()
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ModuleName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for ModuleName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn canonicalize(name: &str) -> String {
    name.replace('-', "_")
}

/// Whether a module should be loaded and persisted, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnsureState {
    #[default]
    Present,
    Absent,
}

impl fmt::Display for EnsureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("present"),
            Self::Absent => f.write_str("absent"),
        }
    }
}

/// Init system owning module loading at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitSystem {
    Systemd,
    Other,
}

impl fmt::Display for InitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Systemd => f.write_str("systemd"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// Distribution family, as far as module persistence is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionFamily {
    Debian,
    Suse,
    RedHat,
    Other,
}

impl fmt::Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debian => "debian",
            Self::Suse => "suse",
            Self::RedHat => "redhat",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Host facts read once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostProfile {
    pub init_system: InitSystem,
    pub family: DistributionFamily,
}

impl HostProfile {
    pub fn new(init_system: InitSystem, family: DistributionFamily) -> Self {
        Self {
            init_system,
            family,
        }
    }
}

impl fmt::Display for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "init={} family={}", self.init_system, self.family)
    }
}

/// Ownership and permission bits for a managed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileAttributes {
    pub owner: String,
    pub group: String,
    #[serde(with = "octal")]
    pub mode: u32,
}

impl FileAttributes {
    pub fn new(owner: impl Into<String>, group: impl Into<String>, mode: u32) -> Self {
        Self {
            owner: owner.into(),
            group: group.into(),
            mode,
        }
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.owner, self.group, format_mode(self.mode))
    }
}

/// Ownership and modes applied to every persistence artifact of a host.
///
/// Static content gets `file_mode`; executable scripts get `exec_mode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionPolicy {
    pub owner: String,
    pub group: String,
    #[serde(with = "octal")]
    pub file_mode: u32,
    #[serde(with = "octal")]
    pub exec_mode: u32,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            owner: "root".to_string(),
            group: "root".to_string(),
            file_mode: 0o644,
            exec_mode: 0o755,
        }
    }
}

impl PermissionPolicy {
    /// Attributes for a plain content file.
    pub fn file_attributes(&self) -> FileAttributes {
        FileAttributes::new(&self.owner, &self.group, self.file_mode)
    }

    /// Attributes for an executable script.
    pub fn exec_attributes(&self) -> FileAttributes {
        FileAttributes::new(&self.owner, &self.group, self.exec_mode)
    }
}

/// One reconciliation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub name: ModuleName,
    #[serde(default)]
    pub ensure: EnsureState,
    /// Structured config file edited on Debian and Suse hosts
    #[serde(default, rename = "file")]
    pub target_file: Option<PathBuf>,
}

impl LoadRequest {
    pub fn new(name: ModuleName, ensure: EnsureState) -> Self {
        Self {
            name,
            ensure,
            target_file: None,
        }
    }

    pub fn with_target_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_file = Some(path.into());
        self
    }
}

/// Parse octal permission bits such as `0644`, `644` or `0o644`.
pub fn parse_mode(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if !digits.is_empty() && mode <= 0o7777 => Ok(mode),
        _ => Err(Error::InvalidMode(raw.to_string())),
    }
}

/// Render permission bits the way `chmod` takes them.
pub fn format_mode(mode: u32) -> String {
    format!("{mode:04o}")
}

/// Serde adapter for modes written as octal strings.
mod octal {
    use super::{format_mode, parse_mode};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_mode(*mode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_mode(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_validation() {
        assert!(ModuleName::parse("foo").is_ok());
        assert!(ModuleName::parse("nf_conntrack").is_ok());
        assert!(ModuleName::parse("snd-hda-intel").is_ok());
        assert!(ModuleName::parse("").is_err());
        assert!(ModuleName::parse("foo bar").is_err());
        assert!(ModuleName::parse("foo;rm").is_err());
        assert!(ModuleName::parse("../foo").is_err());
    }

    #[test]
    fn test_module_name_cannot_look_like_an_option() {
        for name in ["-r", "-a", "--force", "--", "-foo"] {
            let err = ModuleName::parse(name).unwrap_err();
            assert!(matches!(err, Error::InvalidModuleName { .. }), "{name}");
        }
        assert!(ModuleName::parse("_foo").is_ok());
        assert!(ModuleName::parse("foo-").is_ok());
    }

    #[test]
    fn test_module_name_canonical_matching() {
        let name = ModuleName::parse("snd-hda-intel").unwrap();
        assert_eq!(name.as_str(), "snd-hda-intel");
        assert_eq!(name.canonical(), "snd_hda_intel");
        assert!(name.matches("snd_hda_intel"));
        assert!(!name.matches("snd_hda_intel_x"));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert_eq!(parse_mode("0o711").unwrap(), 0o711);
        assert!(parse_mode("").is_err());
        assert!(parse_mode("0999").is_err());
        assert!(parse_mode("17777").is_err());
    }

    #[test]
    fn test_format_mode() {
        assert_eq!(format_mode(0o644), "0644");
        assert_eq!(format_mode(0o4755), "4755");
    }

    #[test]
    fn test_policy_defaults() {
        let policy = PermissionPolicy::default();
        assert_eq!(policy.owner, "root");
        assert_eq!(policy.group, "root");
        assert_eq!(policy.file_attributes().mode, 0o644);
        assert_eq!(policy.exec_attributes().mode, 0o755);
    }

    #[test]
    fn test_policy_serde_uses_octal_strings() {
        let json = r#"{"owner":"adm","group":"sys","file_mode":"0600","exec_mode":"0711"}"#;
        let policy: PermissionPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.file_mode, 0o600);
        assert_eq!(policy.exec_mode, 0o711);
        assert_eq!(serde_json::to_string(&policy).unwrap(), json);
    }

    #[test]
    fn test_request_rejects_bad_name() {
        let json = r#"{"name":"foo bar"}"#;
        assert!(serde_json::from_str::<LoadRequest>(json).is_err());

        let json = r#"{"name":"foo","file":"/etc/modules"}"#;
        let request: LoadRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.ensure, EnsureState::Present);
        assert_eq!(request.target_file, Some(PathBuf::from("/etc/modules")));
    }

    #[test]
    fn test_host_profile_display() {
        let profile = HostProfile::new(InitSystem::Systemd, DistributionFamily::RedHat);
        assert_eq!(profile.to_string(), "init=systemd family=redhat");
    }
}

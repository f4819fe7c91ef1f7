//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::process::Output;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyResult {
    /// Already in the desired state
    Unchanged,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// A command was run to converge the resource
    Executed { command: String },
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Modified | Self::Removed | Self::Executed { .. }
        )
    }

    /// Collapse into the coarse outcome reported per operation
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Unchanged => Outcome::Unchanged,
            Self::Created | Self::Modified | Self::Removed | Self::Executed { .. } => {
                Outcome::Applied
            }
            Self::Failed { .. } => Outcome::Failed,
            Self::Skipped { .. } => Outcome::Skipped,
        }
    }
}

/// Terminal outcome of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Unchanged,
    Skipped,
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unchanged: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed + self.executed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.unchanged
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.removed += other.removed;
        self.executed += other.executed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.unchanged += other.unchanged;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Unchanged => self.unchanged += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Executed { .. } => self.executed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

impl<'a> FromIterator<&'a ApplyResult> for ExecuteSummary {
    fn from_iter<I: IntoIterator<Item = &'a ApplyResult>>(iter: I) -> Self {
        let mut summary = Self::default();
        for result in iter {
            summary.add_result(result);
        }
        summary
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just report what would happen
    pub dry_run: bool,
    /// Number of resource groups applied in parallel
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
        }
    }
}

/// Output from an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            code: output.status.code(),
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// A successful run with no output
    pub fn ok() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            code: Some(0),
            success: true,
        }
    }

    /// A failed run with the given exit code and stderr
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            code: Some(code),
            success: false,
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_collapses_changes() {
        assert_eq!(ApplyResult::Created.outcome(), Outcome::Applied);
        assert_eq!(ApplyResult::Removed.outcome(), Outcome::Applied);
        assert_eq!(
            ApplyResult::Executed {
                command: "modprobe foo".into()
            }
            .outcome(),
            Outcome::Applied
        );
        assert_eq!(ApplyResult::Unchanged.outcome(), Outcome::Unchanged);
        assert_eq!(
            ApplyResult::Failed {
                error: "boom".into()
            }
            .outcome(),
            Outcome::Failed
        );
    }

    #[test]
    fn test_summary_from_results() {
        let results = [
            ApplyResult::Created,
            ApplyResult::Unchanged,
            ApplyResult::Unchanged,
            ApplyResult::Failed {
                error: "boom".into(),
            },
        ];
        let summary: ExecuteSummary = results.iter().collect();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(summary.total_changes(), 1);
        assert_eq!(summary.total(), 4);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_apply_result_serializes_tagged() {
        let json = serde_json::to_string(&ApplyResult::Skipped {
            reason: "dry run".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"result":"skipped","reason":"dry run"}"#);
    }
}

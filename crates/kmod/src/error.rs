//! Error types for module reconciliation.
//!
//! Errors are categorized so the reconciler can tell which ones abort a
//! module's run and which ones fail a single operation.

use crate::types::{DistributionFamily, HostProfile};
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Live module state could not be read
    Probe,
    /// No persistence mechanism for this host
    Platform,
    /// The request itself is unusable
    Input,
    /// An external collaborator (exec, file, editor) failed
    Collaborator,
}

impl ErrorCategory {
    /// Whether this error aborts the whole module before any mutation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Input)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Probe => "Module state unavailable",
            Self::Platform => "Unsupported platform",
            Self::Input => "Invalid request",
            Self::Collaborator => "External command or file operation failed",
        }
    }
}

/// Errors that can occur while reconciling a kernel module.
#[derive(Debug, Error)]
pub enum Error {
    /// The live module list could not be read
    #[error("cannot read loaded modules from {source_name}: {message}")]
    ProbeUnavailable {
        /// Where the module list was read from
        source_name: String,
        /// Underlying failure
        message: String,
    },

    /// No persistence mechanism exists for the host
    #[error("no persistence mechanism for host ({profile})")]
    UnsupportedPlatform {
        /// The host that has no mechanism
        profile: HostProfile,
    },

    /// Debian and Suse edits need a user supplied target file
    #[error("{family} hosts need a target file to persist module '{module}'")]
    MissingTargetFile {
        /// Module being reconciled
        module: String,
        /// Family that requires the file
        family: DistributionFamily,
    },

    /// Module names are kernel tokens: letters, digits, '_' and '-'
    #[error("invalid module name '{name}': only letters, digits, '_' and '-' are allowed")]
    InvalidModuleName {
        /// The rejected name
        name: String,
    },

    /// File modes are octal permission bits
    #[error("invalid file mode '{0}': expected octal permission bits such as 0644")]
    InvalidMode(String),

    /// An external collaborator failed
    #[error("{operation} failed: {message}")]
    Collaborator {
        /// What was being attempted
        operation: String,
        /// Details from the collaborator
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a collaborator failure.
    pub fn collaborator(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ProbeUnavailable { .. } => ErrorCategory::Probe,
            Error::UnsupportedPlatform { .. } => ErrorCategory::Platform,
            Error::MissingTargetFile { .. }
            | Error::InvalidModuleName { .. }
            | Error::InvalidMode(_) => ErrorCategory::Input,
            Error::Collaborator { .. } | Error::Io(_) => ErrorCategory::Collaborator,
        }
    }

    /// Whether this error aborts the module before any mutation.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }
}

/// Result type for module reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

//! Apply context and callback traits
//!
//! These traits allow the declarative crate to be used without
//! depending on specific UI implementations.

use crate::types::ApplyResult;
use anyhow::Result;

/// Progress callback for execution operations
///
/// Groups run in parallel. Each group's callbacks are delivered as soon
/// as it finishes, so groups are reported in completion order.
pub trait ProgressCallback: Send {
    /// Called when starting to report a group of resources
    fn on_group_start(&mut self, name: &str, count: usize);

    /// Called once per resource with its result
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called when a group has been reported
    fn on_group_complete(&mut self, name: &str);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_group_start(&mut self, _name: &str, _count: usize) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_group_complete(&mut self, _name: &str) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to resource apply operations
#[derive(Debug, Clone, Copy, Default)]
///
/// Dry runs never reach a resource; the executor reports them itself.
pub struct ApplyContext {
    /// Whether to output verbose information
    pub verbose: bool,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

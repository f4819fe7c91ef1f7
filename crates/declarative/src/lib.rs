//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging systems to match the desired state.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (files, loaded modules, config entries)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: Independent groups of resources; each group is applied in order
//! - **LockTable**: Keyed locks so resources writing the same target never interleave
//! - **Executor**: Applies groups in parallel and reports every resource's result
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, ExecutionPlan, LockTable, ResourceGroup, execute};
//! use declarative::{AutoConfirm, NoProgress};
//!
//! let mut group = ResourceGroup::new("br_netfilter");
//! group.push(Box::new(load_resource));
//! group.push(Box::new(persistence_resource));
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_group(group);
//!
//! let reports = execute(
//!     &plan,
//!     &ExecuteOptions::default(),
//!     &LockTable::new(),
//!     &mut NoProgress,
//!     &mut AutoConfirm,
//! )?;
//! ```
//!
//! ## Callback Traits
//!
//! - [`ProgressCallback`]: Receives per-resource results
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diff;
pub mod executor;
pub mod lock;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use executor::{GroupReport, ResourceReport, execute, execute_group};
pub use lock::LockTable;
pub use planner::{ExecutionPlan, ResourceGroup};
pub use resource::{BoxedResource, Resource};
pub use types::{
    ApplyResult, CommandOutput, ExecuteOptions, ExecuteSummary, Outcome, ResourceState,
};

//! Terminal side of reconciliation
//!
//! The core in the `kmod` crate plans and applies; this module shows:
//! 1. Diffing - pending changes and file content diffs
//! 2. Executing - progress, confirmation and per-module reports

pub mod differ;
pub mod executor;

pub use differ::{display_diff, show_content_diff};
pub use executor::{TerminalProgress, print_report, print_summary};

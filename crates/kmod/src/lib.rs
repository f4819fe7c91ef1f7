//! # kmod
//!
//! Idempotent reconciliation of kernel module state.
//!
//! For one module and a target state (present or absent) this crate:
//! - Loads or unloads the module now, only when the live state differs
//! - Persists the decision across reboots through the host's mechanism
//! - Reports every operation as applied, unchanged, skipped or failed
//!
//! ## Mechanisms
//!
//! | Host                        | Persistence                                   |
//! |-----------------------------|-----------------------------------------------|
//! | systemd, any family         | `/etc/modules-load.d/<name>.conf`             |
//! | Debian family               | entry in a user supplied file, `Modules` lens |
//! | Suse family                 | `MODULES_LOADED_ON_BOOT` entry, `ShellVarsList` lens |
//! | RedHat family               | `/etc/sysconfig/modules/<name>.modules` script |
//! | anything else               | none; the module is still loaded or unloaded  |
//!
//! ## Example
//!
//! ```no_run
//! use kmod::{
//!     Collaborators, EnsureState, FactsProvider, LoadRequest, ModuleName, PermissionPolicy,
//!     Reconciler, SystemFacts,
//! };
//!
//! let profile = SystemFacts::default().host_profile()?;
//! let reconciler = Reconciler::new(Collaborators::system(), profile);
//!
//! let request = LoadRequest::new(ModuleName::parse("br_netfilter")?, EnsureState::Present);
//! let report = reconciler.reconcile(&request, &PermissionPolicy::default())?;
//!
//! for (id, outcome) in report.outcomes() {
//!     println!("{id}: {outcome}");
//! }
//! # Ok::<(), kmod::Error>(())
//! ```
//!
//! Host access goes through the traits in [`backend`], so the whole core
//! runs against in-memory fakes in tests.

pub mod backend;
pub mod compiler;
pub mod error;
pub mod facts;
pub mod mechanism;
pub mod probe;
pub mod reconciler;
pub mod resource;
pub mod types;

pub use backend::{Collaborators, CommandExecutor, ConfigEditor, FileStore, Lens, ModuleList};
pub use compiler::{
    CompiledModule, EditArtifact, FileArtifact, GuardPredicate, LoadGuardOperation, Persistence,
    PersistenceArtifact, TOOL_NAME, compile,
};
pub use error::{Error, ErrorCategory, Result};
pub use facts::{FactsProvider, StaticFacts, SystemFacts};
pub use mechanism::{ChangeStyle, Mechanism, select};
pub use probe::StateProbe;
pub use reconciler::{ReconciliationReport, Reconciler};
pub use types::{
    DistributionFamily, EnsureState, FileAttributes, HostProfile, InitSystem, LoadRequest,
    ModuleName, PermissionPolicy, format_mode, parse_mode,
};

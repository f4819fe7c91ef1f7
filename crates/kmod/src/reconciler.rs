//! Reconciliation: compile, compare, converge and report.
//!
//! Each module becomes one resource group. The load guard and the
//! persistence steps of a group run in order and independently: a failed
//! step is reported and the next one still runs. Groups of different modules
//! run in parallel, with writes to the same artifact path serialized through
//! a shared [`LockTable`].

use crate::backend::Collaborators;
use crate::compiler::{self, CompiledModule, Persistence};
use crate::error::Result;
use crate::mechanism::{self, Mechanism};
use crate::resource::resources_for;
use crate::types::{HostProfile, LoadRequest, ModuleName, PermissionPolicy};
use declarative::{
    ApplyResult, ConfirmCallback, ExecuteOptions, ExecuteSummary, ExecutionPlan, LockTable,
    Outcome, ProgressCallback, ResourceDiff, ResourceGroup, ResourceReport, compute_diffs,
};
use serde::Serialize;
use std::sync::Arc;

/// Resource type of the entry reported when a host has no persistence mechanism.
pub const UNSUPPORTED_PERSISTENCE: &str = "persistence";

/// Per-operation outcomes of one module, in the order they ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub module: ModuleName,
    pub entries: Vec<ResourceReport>,
    /// Set when the module was rejected before any operation ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl ReconciliationReport {
    pub fn new(module: ModuleName, entries: Vec<ResourceReport>) -> Self {
        Self {
            module,
            entries,
            aborted: None,
        }
    }

    pub fn aborted(module: ModuleName, reason: impl Into<String>) -> Self {
        Self {
            module,
            entries: Vec::new(),
            aborted: Some(reason.into()),
        }
    }

    pub fn summary(&self) -> ExecuteSummary {
        self.entries.iter().map(|e| &e.result).collect()
    }

    pub fn outcomes(&self) -> Vec<(&str, Outcome)> {
        self.entries
            .iter()
            .map(|e| (e.id.as_str(), e.result.outcome()))
            .collect()
    }

    /// No operation failed and the module was not aborted.
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.summary().is_success()
    }

    /// Nothing needed changing.
    ///
    /// The skipped persistence entry of an unsupported host does not count
    /// against convergence.
    pub fn is_converged(&self) -> bool {
        self.aborted.is_none()
            && self.entries.iter().all(|e| {
                e.result == ApplyResult::Unchanged || e.resource_type == UNSUPPORTED_PERSISTENCE
            })
    }
}

/// Applies compiled modules through a set of collaborators.
#[derive(Debug, Clone)]
pub struct Reconciler {
    collaborators: Collaborators,
    profile: HostProfile,
    options: ExecuteOptions,
    locks: Arc<LockTable>,
}

impl Reconciler {
    pub fn new(collaborators: Collaborators, profile: HostProfile) -> Self {
        Self {
            collaborators,
            profile,
            options: ExecuteOptions::default(),
            locks: Arc::new(LockTable::new()),
        }
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn profile(&self) -> HostProfile {
        self.profile
    }

    pub fn options(&self) -> &ExecuteOptions {
        &self.options
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    pub fn mechanism(&self) -> Result<Mechanism> {
        mechanism::select(&self.profile)
    }

    pub fn compile(&self, request: &LoadRequest, policy: &PermissionPolicy) -> Result<CompiledModule> {
        compiler::compile(request, self.mechanism(), policy)
    }

    fn group(&self, compiled: &CompiledModule) -> ResourceGroup {
        let mut group = ResourceGroup::new(compiled.request.name.as_str());
        for resource in resources_for(compiled, &self.collaborators) {
            group.push(resource);
        }
        group
    }

    /// Converge one compiled module.
    pub fn apply(&self, compiled: &CompiledModule) -> ReconciliationReport {
        let group = self.group(compiled);
        let report = declarative::execute_group(&group, &self.options, &self.locks);
        finish(compiled, report.entries)
    }

    /// Compile and converge one request.
    ///
    /// Fails without touching the host when the request cannot be compiled.
    pub fn reconcile(
        &self,
        request: &LoadRequest,
        policy: &PermissionPolicy,
    ) -> Result<ReconciliationReport> {
        let compiled = self.compile(request, policy)?;
        Ok(self.apply(&compiled))
    }

    /// Converge many requests, in parallel up to `options.jobs`.
    ///
    /// A request that fails to compile gets an aborted report; the others
    /// still run. Reports come back in request order.
    pub fn reconcile_all<P, C>(
        &self,
        requests: &[LoadRequest],
        policy: &PermissionPolicy,
        progress: &mut P,
        confirm: &mut C,
    ) -> anyhow::Result<Vec<ReconciliationReport>>
    where
        P: ProgressCallback,
        C: ConfirmCallback,
    {
        let compiled: Vec<Result<CompiledModule>> = requests
            .iter()
            .map(|request| self.compile(request, policy))
            .collect();

        let mut plan = ExecutionPlan::new();
        for module in compiled.iter().flatten() {
            plan.add_group(self.group(module));
        }

        let mut groups =
            declarative::execute(&plan, &self.options, &self.locks, progress, confirm)?.into_iter();

        let reports = requests
            .iter()
            .zip(compiled)
            .map(|(request, compiled)| match compiled {
                Ok(module) => {
                    let entries = groups.next().map(|g| g.entries).unwrap_or_default();
                    finish(&module, entries)
                }
                Err(err) => {
                    let kind = err.category().description();
                    if err.is_fatal() {
                        log::error!("{}: {kind}: {err}", request.name);
                    } else {
                        log::warn!("{}: {kind}: {err}", request.name);
                    }
                    ReconciliationReport::aborted(request.name.clone(), err.to_string())
                }
            })
            .collect();

        Ok(reports)
    }

    /// Resources of a request whose current state differs from the desired one.
    pub fn diff(&self, request: &LoadRequest, policy: &PermissionPolicy) -> Result<Vec<ResourceDiff>> {
        let compiled = self.compile(request, policy)?;
        Ok(compute_diffs(&resources_for(&compiled, &self.collaborators)))
    }
}

/// Attach the skipped persistence entry of an unsupported host.
fn finish(compiled: &CompiledModule, mut entries: Vec<ResourceReport>) -> ReconciliationReport {
    let name = &compiled.request.name;
    if let Persistence::Unsupported { reason } = &compiled.persistence {
        log::warn!("{name}: not persisted across reboots: {reason}");
        entries.push(ResourceReport {
            id: format!("persistence:{name}"),
            resource_type: UNSUPPORTED_PERSISTENCE.to_string(),
            description: format!("Persist module {name} across reboots"),
            result: ApplyResult::Skipped {
                reason: reason.clone(),
            },
        });
    }
    ReconciliationReport::new(name.clone(), entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryHost;
    use crate::types::{DistributionFamily, EnsureState, FileAttributes, InitSystem};
    use declarative::{AutoConfirm, AutoDecline, NoProgress};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn reconciler(host: &Arc<MemoryHost>, init: InitSystem, family: DistributionFamily) -> Reconciler {
        Reconciler::new(
            Collaborators::from_host(host.clone()),
            HostProfile::new(init, family),
        )
    }

    fn request(name: &str, ensure: EnsureState) -> LoadRequest {
        LoadRequest::new(ModuleName::parse(name).unwrap(), ensure)
    }

    fn results(report: &ReconciliationReport) -> Vec<(String, ApplyResult)> {
        report
            .entries
            .iter()
            .map(|e| (e.id.clone(), e.result.clone()))
            .collect()
    }

    #[test]
    fn test_systemd_load_and_persist() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Systemd, DistributionFamily::Debian);

        let report = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        assert_eq!(
            results(&report),
            vec![
                (
                    "load:foo".to_string(),
                    ApplyResult::Executed {
                        command: "modprobe foo".to_string()
                    }
                ),
                (
                    "file:/etc/modules-load.d/foo.conf".to_string(),
                    ApplyResult::Created
                ),
            ]
        );
        assert!(report.is_success());
        assert!(!report.is_converged());
        assert!(host.is_loaded("foo"));
        assert_eq!(
            host.file("/etc/modules-load.d/foo.conf").unwrap().0,
            "# This file is managed by kmodctl.\nfoo\n"
        );
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let cases = [
            (InitSystem::Systemd, DistributionFamily::Other),
            (InitSystem::Other, DistributionFamily::Debian),
            (InitSystem::Other, DistributionFamily::Suse),
            (InitSystem::Other, DistributionFamily::RedHat),
        ];

        for (init, family) in cases {
            for ensure in [EnsureState::Present, EnsureState::Absent] {
                let host = Arc::new(MemoryHost::with_loaded(&["foo"]));
                let reconciler = reconciler(&host, init, family);
                let request = request("foo", ensure).with_target_file("/foo/bar");
                let policy = PermissionPolicy::default();

                reconciler.reconcile(&request, &policy).unwrap();
                let second = reconciler.reconcile(&request, &policy).unwrap();

                assert!(
                    second.is_converged(),
                    "{init}/{family}/{ensure}: {:?}",
                    second.entries
                );
                assert!(second.entries.iter().all(|e| e.result.outcome() == Outcome::Unchanged));
            }
        }
    }

    #[test]
    fn test_debian_unload_and_remove_entry() {
        let host = Arc::new(MemoryHost::with_loaded(&["foo"]));
        host.state()
            .entries
            .insert(
                PathBuf::from("/foo/bar"),
                BTreeSet::from(["foo".to_string(), "loop".to_string()]),
            );
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::Debian);

        let report = reconciler
            .reconcile(
                &request("foo", EnsureState::Absent).with_target_file("/foo/bar"),
                &PermissionPolicy::default(),
            )
            .unwrap();

        assert_eq!(
            report.outcomes(),
            vec![
                ("load:foo", Outcome::Applied),
                ("augeas:/foo/bar:foo", Outcome::Applied),
                ("attributes:/foo/bar", Outcome::Unchanged),
            ]
        );
        assert!(!host.is_loaded("foo"));
        assert_eq!(host.entries("/foo/bar"), BTreeSet::from(["loop".to_string()]));
        assert_eq!(host.commands(), ["modprobe -r -- foo"]);
    }

    #[test]
    fn test_suse_edit_enforces_target_ownership() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::Suse);
        let policy = PermissionPolicy {
            owner: "adm".to_string(),
            group: "sys".to_string(),
            file_mode: 0o600,
            exec_mode: 0o711,
        };

        let report = reconciler
            .reconcile(
                &request("foo", EnsureState::Present).with_target_file("/etc/sysconfig/kernel"),
                &policy,
            )
            .unwrap();

        assert!(report.is_success());
        let edits = host.state().edits.clone();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].2, "set MODULES_LOADED_ON_BOOT/value[.='foo'] 'foo'");
        assert_eq!(
            host.file("/etc/sysconfig/kernel").unwrap().1,
            FileAttributes::new("adm", "sys", 0o600)
        );
    }

    #[test]
    fn test_redhat_script_uses_exec_mode() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::RedHat);

        reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        let (content, attrs) = host.file("/etc/sysconfig/modules/foo.modules").unwrap();
        assert_eq!(attrs.mode, 0o755);
        assert!(content.contains("exec /sbin/modprobe foo > /dev/null 2>&1"));
    }

    #[test]
    fn test_unsupported_platform_still_loads() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::Other);

        let report = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        assert_eq!(
            report.outcomes(),
            vec![
                ("load:foo", Outcome::Applied),
                ("persistence:foo", Outcome::Skipped)
            ]
        );
        assert!(report.is_success());
        assert!(host.is_loaded("foo"));
        assert!(host.state().files.is_empty());

        let again = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();
        assert!(again.is_converged());
    }

    #[test]
    fn test_missing_target_file_aborts_before_mutation() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::Debian);

        let err = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(host.commands().is_empty());
        assert!(!host.is_loaded("foo"));
    }

    #[test]
    fn test_unreadable_module_list_does_not_block_persistence() {
        let host = Arc::new(MemoryHost::new());
        host.state().probe_unavailable = true;
        let reconciler = reconciler(&host, InitSystem::Systemd, DistributionFamily::Other);

        let report = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        assert_eq!(
            report.outcomes(),
            vec![
                ("load:foo", Outcome::Failed),
                ("file:/etc/modules-load.d/foo.conf", Outcome::Applied),
            ]
        );
        assert!(!report.is_success());
        let ApplyResult::Failed { error } = &report.entries[0].result else {
            panic!("expected failure");
        };
        assert!(error.contains("cannot read loaded modules"));
    }

    #[test]
    fn test_failed_load_does_not_block_persistence() {
        let host = Arc::new(MemoryHost::new());
        host.state().fail_commands = true;
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::RedHat);

        let report = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        assert_eq!(report.entries[0].result.outcome(), Outcome::Failed);
        assert_eq!(report.entries[1].result, ApplyResult::Created);
    }

    #[test]
    fn test_failed_persistence_is_reported() {
        let host = Arc::new(MemoryHost::new());
        host.state().fail_writes = true;
        let reconciler = reconciler(&host, InitSystem::Systemd, DistributionFamily::Other);

        let report = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        assert_eq!(report.entries[0].result.outcome(), Outcome::Applied);
        assert_eq!(report.entries[1].result.outcome(), Outcome::Failed);
        assert_eq!(report.summary().failed, 1);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Systemd, DistributionFamily::Other).with_options(
            ExecuteOptions {
                dry_run: true,
                ..Default::default()
            },
        );

        let report = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        assert_eq!(
            report.entries[0].result,
            ApplyResult::Skipped {
                reason: "dry run: would load module foo".to_string()
            }
        );
        assert_eq!(report.entries[1].result.outcome(), Outcome::Skipped);
        assert!(host.commands().is_empty());
        assert!(host.state().files.is_empty());
    }

    #[test]
    fn test_diff_lists_pending_resources() {
        let host = Arc::new(MemoryHost::with_loaded(&["foo"]));
        let reconciler = reconciler(&host, InitSystem::Systemd, DistributionFamily::Other);
        let request = request("foo", EnsureState::Present);

        let diffs = reconciler.diff(&request, &PermissionPolicy::default()).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].resource_id, "file:/etc/modules-load.d/foo.conf");
        assert!(diffs[0].is_addition());

        reconciler.reconcile(&request, &PermissionPolicy::default()).unwrap();
        assert!(reconciler.diff(&request, &PermissionPolicy::default()).unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_all_shares_target_file() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::Debian)
            .with_options(ExecuteOptions {
                jobs: 8,
                ..Default::default()
            });

        let names: Vec<String> = (0..16).map(|i| format!("mod{i}")).collect();
        let requests: Vec<LoadRequest> = names
            .iter()
            .map(|name| request(name, EnsureState::Present).with_target_file("/etc/modules"))
            .collect();

        let reports = reconciler
            .reconcile_all(
                &requests,
                &PermissionPolicy::default(),
                &mut NoProgress,
                &mut AutoConfirm,
            )
            .unwrap();

        assert_eq!(reports.len(), 16);
        for (report, name) in reports.iter().zip(&names) {
            assert_eq!(report.module.as_str(), name);
            assert!(report.is_success());
        }
        assert_eq!(host.entries("/etc/modules").len(), 16);
        assert_eq!(host.state().edits.len(), 16);
        assert_eq!(reconciler.locks().len(), 1);
    }

    #[test]
    fn test_reconcile_all_isolates_rejected_requests() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::Debian);
        let requests = vec![
            request("foo", EnsureState::Present),
            request("bar", EnsureState::Present).with_target_file("/etc/modules"),
        ];

        let reports = reconciler
            .reconcile_all(
                &requests,
                &PermissionPolicy::default(),
                &mut NoProgress,
                &mut AutoConfirm,
            )
            .unwrap();

        assert!(reports[0].aborted.is_some());
        assert!(reports[0].entries.is_empty());
        assert!(!reports[0].is_success());
        assert!(reports[1].is_success());
        assert!(host.is_loaded("bar"));
        assert!(!host.is_loaded("foo"));
    }

    #[test]
    fn test_reconcile_all_declined() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Systemd, DistributionFamily::Other);

        let reports = reconciler
            .reconcile_all(
                &[request("foo", EnsureState::Present)],
                &PermissionPolicy::default(),
                &mut NoProgress,
                &mut AutoDecline,
            )
            .unwrap();

        assert!(reports[0].entries.iter().all(|e| e.result.outcome() == Outcome::Skipped));
        assert!(host.commands().is_empty());
    }

    #[test]
    fn test_report_serializes_results() {
        let host = Arc::new(MemoryHost::new());
        let reconciler = reconciler(&host, InitSystem::Other, DistributionFamily::Other);
        let report = reconciler
            .reconcile(&request("foo", EnsureState::Present), &PermissionPolicy::default())
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["module"], "foo");
        assert_eq!(json["entries"][0]["id"], "load:foo");
        assert_eq!(json["entries"][0]["result"], "executed");
        assert_eq!(json["entries"][1]["result"], "skipped");
        assert!(json.get("aborted").is_none());
    }
}

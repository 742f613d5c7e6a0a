use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::thread;

use thiserror::Error;

use crate::git::Git;
use crate::model::package_root::PackageRoot;
use crate::msg::{Msg, Notifier};
use crate::plugin::hooks::{HookContext, HookKind};
use crate::plugin::host::Host;
use crate::plugin::installer::InstallOutcome;
use crate::plugin::lock::{LockError, LockStore};
use crate::plugin::resolver::resolve;
use crate::plugin::spec::{Pinning, PluginSpec};
use crate::plugin::status::{self, StatusView, short_hash};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("plugin not found: {0}")]
    NotFound(String),
    #[error("{0}: local plugin, skipped")]
    LocalPlugin(String),
    #[error("failed to remove {name}: {source}")]
    Remove {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Active plugin specs by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    order: Vec<String>,
    specs: HashMap<String, PluginSpec>,
}

impl Registry {
    pub fn from_entries<S: Into<PluginSpec>>(entries: impl IntoIterator<Item = S>) -> Self {
        let mut registry = Self::default();
        for entry in entries {
            registry.insert(entry.into());
        }
        registry
    }

    /// Register `spec`. A duplicate name replaces the earlier spec in place.
    pub fn insert(&mut self, spec: PluginSpec) -> bool {
        let name = spec.name.clone();
        let replaced = self.specs.insert(name.clone(), spec).is_some();
        if replaced {
            tracing::warn!("duplicate plugin {name}: later spec replaces the earlier one");
        } else {
            self.order.push(name);
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&PluginSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PluginSpec> {
        let spec = self.specs.remove(name)?;
        self.order.retain(|entry| entry != name);
        Some(spec)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginSpec> {
        self.order.iter().filter_map(|name| self.specs.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Outcome of one convergence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub cloned: usize,
    pub loaded: usize,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Aggregate outcome of update/restore/lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub operation: &'static str,
    pub succeeded: usize,
    pub issues: Vec<String>,
}

impl BatchReport {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            succeeded: 0,
            issues: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        let mut text = format!("{}: {} succeeded", self.operation, self.succeeded);
        if !self.issues.is_empty() {
            text.push_str(&format!(", {} issues", self.issues.len()));
            for issue in &self.issues {
                text.push_str(&format!("\n  {issue}"));
            }
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSummary {
    pub name: String,
    pub url: String,
    pub pinning: Pinning,
    pub local_dir: Option<PathBuf>,
    pub installed: bool,
    pub locked: Option<String>,
}

/// The reconciliation engine: owns the registry and lock store for the process.
pub struct PluginManager {
    pub(super) root: PackageRoot,
    pub(super) registry: Registry,
    pub(super) lock: LockStore,
    pub(super) host: Box<dyn Host>,
    pub(super) notifier: Notifier,
}

impl PluginManager {
    pub fn new(
        root: PackageRoot,
        lock: LockStore,
        host: Box<dyn Host>,
        notifier: Notifier,
    ) -> Self {
        Self {
            root,
            registry: Registry::default(),
            lock,
            host,
            notifier,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn lock_store(&self) -> &LockStore {
        &self.lock
    }

    pub fn package_root(&self) -> &PackageRoot {
        &self.root
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    pub fn git(&self, name: &str) -> Git {
        Git::new(self.root.plugin_dir(name))
    }

    /// Replace the registry with `entries` without touching disk.
    pub fn register<S: Into<PluginSpec>>(&mut self, entries: impl IntoIterator<Item = S>) {
        self.registry = Registry::from_entries(entries);
    }

    /// Full convergence pass over `entries`, in order.
    pub fn setup<S: Into<PluginSpec>>(
        &mut self,
        entries: impl IntoIterator<Item = S>,
    ) -> SetupReport {
        self.register(entries);
        let mut report = SetupReport::default();

        if let Err(err) = std::fs::create_dir_all(self.root.path()) {
            self.notifier.error(format!(
                "cannot create package root {}: {err}",
                self.root.path().display()
            ));
            report.failed = self.registry.names().to_vec();
            return report;
        }

        let locked_before = self.lock.len();
        let specs: Vec<PluginSpec> = self.registry.iter().cloned().collect();
        for spec in &specs {
            match self.install(spec) {
                InstallOutcome::Loaded { cloned } => {
                    report.loaded += 1;
                    if cloned {
                        report.cloned += 1;
                    }
                }
                InstallOutcome::Skipped => report.skipped.push(spec.name.clone()),
                InstallOutcome::Failed => report.failed.push(spec.name.clone()),
            }
        }

        if self.lock.len() != locked_before {
            self.persist_lock();
        }

        self.notifier.info(format!(
            "setup: {} loaded, {} cloned, {} skipped, {} failed",
            report.loaded,
            report.cloned,
            report.skipped.len(),
            report.failed.len()
        ));
        report
    }

    /// Fetch and re-checkout each plugin's pinned target. Success means the commit moved.
    pub fn update(&mut self, names: &[String]) -> BatchReport {
        let mut report = BatchReport::new("update");
        let mut lock_changed = false;

        for spec in self.batch_targets(names, &mut report) {
            let git = self.git(&spec.name);
            let before = match git.current_commit() {
                Ok(commit) => commit,
                Err(err) => {
                    report.issues.push(format!("{}: {err}", spec.name));
                    continue;
                }
            };

            if let Err(err) = git.fetch() {
                self.notifier
                    .error(format!("{}: fetch failed: {}", spec.name, err.stderr()));
                report.issues.push(format!("{}: fetch failed", spec.name));
                continue;
            }

            let target = resolve(&spec);
            if let Err(err) = git.checkout(&target) {
                self.notifier.error(format!(
                    "{}: checkout {target} failed: {}",
                    spec.name,
                    err.stderr()
                ));
                report
                    .issues
                    .push(format!("{}: checkout {target} failed", spec.name));
                continue;
            }

            let after = match git.current_commit() {
                Ok(commit) => commit,
                Err(err) => {
                    report.issues.push(format!("{}: {err}", spec.name));
                    continue;
                }
            };

            if after == before {
                report
                    .issues
                    .push(format!("{}: already up to date", spec.name));
                continue;
            }

            report.succeeded += 1;
            lock_changed |= self.lock.set(&spec.name, &after);
            self.notifier.info(format!(
                "{}: updated {} -> {}",
                spec.name,
                short_hash(&before),
                short_hash(&after)
            ));
            self.run_hook(&spec, HookKind::Build);
        }

        if lock_changed {
            self.persist_lock();
        }
        self.finish(report)
    }

    /// Check out the locked commit of each plugin, ignoring its pinning.
    pub fn restore(&mut self, names: &[String]) -> BatchReport {
        let mut report = BatchReport::new("restore");

        for spec in self.batch_targets(names, &mut report) {
            let Some(locked) = self.lock.commit(&spec.name).map(str::to_string) else {
                report.issues.push(format!("{}: no lock entry", spec.name));
                continue;
            };

            let git = self.git(&spec.name);
            match git.current_commit() {
                Ok(current) if current == locked => {
                    report
                        .issues
                        .push(format!("{}: already at locked state", spec.name));
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    report.issues.push(format!("{}: {err}", spec.name));
                    continue;
                }
            }

            if let Err(err) = git.checkout(&locked) {
                self.notifier.error(format!(
                    "{}: checkout {} failed: {}",
                    spec.name,
                    short_hash(&locked),
                    err.stderr()
                ));
                report.issues.push(format!(
                    "{}: checkout {} failed",
                    spec.name,
                    short_hash(&locked)
                ));
                continue;
            }

            match git.current_commit() {
                Ok(current) if current == locked => {
                    report.succeeded += 1;
                    self.notifier.info(format!(
                        "{}: restored to {}",
                        spec.name,
                        short_hash(&locked)
                    ));
                }
                _ => report
                    .issues
                    .push(format!("{}: checkout did not reach locked commit", spec.name)),
            }
        }

        self.finish(report)
    }

    /// Record each plugin's current commit in the lock store; persist once at the end.
    pub fn lock(&mut self, names: &[String]) -> BatchReport {
        let mut report = BatchReport::new("lock");

        for spec in self.batch_targets(names, &mut report) {
            let current = match self.git(&spec.name).current_commit() {
                Ok(commit) => commit,
                Err(err) => {
                    report.issues.push(format!("{}: {err}", spec.name));
                    continue;
                }
            };

            if self.lock.set(&spec.name, &current) {
                report.succeeded += 1;
                self.notifier.info(format!(
                    "{}: locked at {}",
                    spec.name,
                    short_hash(&current)
                ));
            } else {
                report.issues.push(format!(
                    "{}: already locked at {}",
                    spec.name,
                    short_hash(&current)
                ));
            }
        }

        self.persist_lock();
        self.finish(report)
    }

    /// Remove a plugin's working directory and drop it from the registry.
    /// The lockfile is left alone; see [`PluginManager::clean_lock`].
    pub fn delete(&mut self, name: &str) -> Result<(), ManagerError> {
        let spec = self
            .registry
            .get(name)
            .ok_or_else(|| ManagerError::NotFound(name.to_string()))?;

        if spec.is_local() {
            let err = ManagerError::LocalPlugin(name.to_string());
            self.notifier.warn(err.to_string());
            return Err(err);
        }

        match self.root.remove(name) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                let err = ManagerError::Remove {
                    name: name.to_string(),
                    source,
                };
                self.notifier.error(err.to_string());
                return Err(err);
            }
        }

        self.registry.remove(name);
        self.notifier.info(format!("{name}: deleted"));
        Ok(())
    }

    /// Drop lock entries with no registered plugin. Returns how many were removed.
    pub fn clean_lock(&mut self) -> Result<usize, ManagerError> {
        let registry = &self.registry;
        let removed = self.lock.retain(|name| registry.contains(name));
        self.lock.save()?;
        self.notifier
            .info(format!("clean lock: {removed} stale entries removed"));
        Ok(removed)
    }

    /// Ask every eligible plugin's remote for commits not yet checked out.
    ///
    /// Each query runs on its own thread and reports through
    /// [`Msg::NewCommits`]; `succeeded` is the number of queries dispatched.
    pub fn check_updates(
        &mut self,
        names: &[String],
    ) -> (BatchReport, Vec<thread::JoinHandle<()>>) {
        let mut report = BatchReport::new("check");
        let mut handles = Vec::new();

        for spec in self.batch_targets(names, &mut report) {
            let tx = self.notifier.sender().clone();
            let name = spec.name.clone();
            let handle = self
                .git(&spec.name)
                .spawn_new_commits(resolve(&spec), move |result| {
                    let _ = tx.send(Msg::NewCommits {
                        name,
                        lines: result.map_err(|err| err.to_string()),
                    });
                });
            handles.push(handle);
            report.succeeded += 1;
        }

        (report, handles)
    }

    pub fn list_plugins(&self) -> Vec<PluginSummary> {
        self.registry
            .iter()
            .map(|spec| {
                let installed = match &spec.local_dir {
                    Some(dir) => dir.is_dir(),
                    None => self.root.plugin_dir(&spec.name).is_dir(),
                };
                PluginSummary {
                    name: spec.name.clone(),
                    url: spec.url.clone(),
                    pinning: spec.pinning.clone(),
                    local_dir: spec.local_dir.clone(),
                    installed,
                    locked: self.lock.commit(&spec.name).map(str::to_string),
                }
            })
            .collect()
    }

    pub fn status_view(&self) -> StatusView {
        status::compute(&self.registry, &self.lock, &self.root, self.host.as_ref())
    }

    /// Resolve the names a batch operation acts on, recording why the rest are left out.
    /// Repeated names are acted on once, at their first position.
    fn batch_targets(&self, names: &[String], report: &mut BatchReport) -> Vec<PluginSpec> {
        let requested: Vec<&str> = if names.is_empty() {
            self.registry.names().iter().map(String::as_str).collect()
        } else {
            names.iter().map(String::as_str).collect()
        };

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for name in requested {
            if !seen.insert(name) {
                continue;
            }

            let Some(spec) = self.registry.get(name) else {
                report.issues.push(format!("{name}: not found"));
                continue;
            };

            if spec.is_local() {
                let issue = format!("{name}: local plugin, skipped");
                self.notifier.warn(issue.clone());
                report.issues.push(issue);
                continue;
            }

            if !self.root.plugin_dir(name).is_dir() {
                report.issues.push(format!("{name}: not installed"));
                continue;
            }

            targets.push(spec.clone());
        }
        targets
    }

    pub(super) fn hook_context(&self, spec: &PluginSpec) -> HookContext {
        HookContext {
            name: spec.name.clone(),
            dir: spec
                .local_dir
                .clone()
                .unwrap_or_else(|| self.root.plugin_dir(&spec.name)),
        }
    }

    /// Run one hook, containing its failure to a notice.
    pub(super) fn run_hook(&self, spec: &PluginSpec, kind: HookKind) {
        if let Err(err) = spec.hooks.run(kind, &self.hook_context(spec)) {
            self.notifier.error(format!("{}: {err}", spec.name));
        }
    }

    pub(super) fn persist_lock(&self) {
        if let Err(err) = self.lock.save() {
            self.notifier.error(err.to_string());
        }
    }

    fn finish(&self, report: BatchReport) -> BatchReport {
        if report.issues.is_empty() {
            self.notifier.info(report.summary());
        } else {
            self.notifier.warn(report.summary());
        }
        report
    }
}

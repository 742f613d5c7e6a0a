use crate::git::Git;
use crate::plugin::hooks::HookKind;
use crate::plugin::manager::PluginManager;
use crate::plugin::resolver::resolve;
use crate::plugin::spec::PluginSpec;
use crate::plugin::status::short_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Loaded { cloned: bool },
    Skipped,
    Failed,
}

impl PluginManager {
    /// Converge one plugin: load gate, clone if absent, lock, then
    /// init -> load -> build (fresh clones only) -> config.
    /// A plugin the host refuses to load is `Failed`; build and config do not run.
    pub(super) fn install(&mut self, spec: &PluginSpec) -> InstallOutcome {
        let ctx = self.hook_context(spec);

        match spec.hooks.allows_load(&ctx) {
            Ok(true) => {}
            Ok(false) => {
                self.notifier
                    .info(format!("{}: load hook declined, skipped", spec.name));
                return InstallOutcome::Skipped;
            }
            Err(err) => {
                self.notifier.error(format!("{}: {err}", spec.name));
                return InstallOutcome::Skipped;
            }
        }

        if let Some(dir) = spec.local_dir.as_ref() {
            if !dir.is_dir() {
                self.notifier.error(format!(
                    "{}: local directory {} does not exist",
                    spec.name,
                    dir.display()
                ));
                return InstallOutcome::Failed;
            }

            self.run_hook(spec, HookKind::Init);
            if let Err(err) = self.host.prepend_path(&spec.name, dir) {
                self.notifier
                    .error(format!("{}: failed to add to search path: {err:#}", spec.name));
            }
            self.run_hook(spec, HookKind::Config);
            return InstallOutcome::Loaded { cloned: false };
        }

        let git = Git::new(&ctx.dir);
        let cloned = !ctx.dir.exists();
        if cloned {
            if let Err(err) = git.clone_repo(&spec.url) {
                self.notifier.error(format!(
                    "{}: clone of {} failed: {}",
                    spec.name,
                    spec.url,
                    err.stderr()
                ));
                return InstallOutcome::Failed;
            }

            // A lock entry wins over the spec so a restored setup reproduces it exactly.
            let target = self
                .lock
                .commit(&spec.name)
                .map(str::to_string)
                .unwrap_or_else(|| resolve(spec));
            if let Err(err) = git.checkout(&target) {
                self.notifier.error(format!(
                    "{}: checkout {target} failed: {}",
                    spec.name,
                    err.stderr()
                ));
            }
        }

        let needs_lock = self.lock.get(&spec.name).is_none();
        if needs_lock || cloned {
            match git.current_commit() {
                Ok(commit) => {
                    if needs_lock {
                        self.lock.set(&spec.name, &commit);
                    }
                    if cloned {
                        self.notifier.info(format!(
                            "{}: installed at {}",
                            spec.name,
                            short_hash(&commit)
                        ));
                    }
                }
                Err(err) => self
                    .notifier
                    .error(format!("{}: cannot read HEAD: {err}", spec.name)),
            }
        }

        self.run_hook(spec, HookKind::Init);
        if let Err(err) = self.host.load_package(&spec.name, &ctx.dir) {
            self.notifier
                .error(format!("{}: failed to load: {err:#}", spec.name));
            return InstallOutcome::Failed;
        }
        if cloned {
            self.run_hook(spec, HookKind::Build);
        }
        self.run_hook(spec, HookKind::Config);

        InstallOutcome::Loaded { cloned }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::mpsc;

    use crate::model::package_root::PackageRoot;
    use crate::msg::{Level, Msg, Notice, Notifier};
    use crate::plugin::hooks::{Hook, Hooks};
    use crate::plugin::host::{Host, RuntimePath};
    use crate::plugin::lock::LockStore;
    use crate::plugin::spec::SpecEntry;

    fn manager(root: &std::path::Path) -> (PluginManager, mpsc::Receiver<Msg>) {
        let (tx, rx) = mpsc::channel();
        let manager = PluginManager::new(
            PackageRoot::new(root.join("packages")),
            LockStore::empty(root.join("lock.json")),
            Box::new(RuntimePath::default()),
            Notifier::new(tx),
        );
        (manager, rx)
    }

    fn notices(rx: &mpsc::Receiver<Msg>) -> Vec<Notice> {
        rx.try_iter()
            .filter_map(|msg| match msg {
                Msg::Notify(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn declined_load_hook_skips_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut manager, rx) = manager(dir.path());
        let spec = PluginSpec::new("/nowhere/gated").with_hooks(Hooks {
            load: Some(Hook::func(|_| Ok(false))),
            init: Some(Hook::func(|_| anyhow::bail!("init must not run"))),
            ..Hooks::default()
        });

        assert_eq!(manager.install(&spec), InstallOutcome::Skipped);
        assert!(!manager.package_root().plugin_dir("gated").exists());
        assert!(notices(&rx).iter().all(|notice| notice.level != Level::Error));
    }

    #[test]
    fn failing_load_hook_is_reported_and_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut manager, rx) = manager(dir.path());
        let spec = PluginSpec::new("/nowhere/broken").with_hooks(Hooks {
            load: Some(Hook::func(|_| anyhow::bail!("boom"))),
            ..Hooks::default()
        });

        assert_eq!(manager.install(&spec), InstallOutcome::Skipped);
        let notices = notices(&rx);
        assert!(notices.iter().any(|notice| notice.level == Level::Error
            && notice.text.contains("broken")
            && notice.text.contains("load hook")));
    }

    struct RefusingHost;

    impl Host for RefusingHost {
        fn load_package(&mut self, name: &str, _dir: &Path) -> anyhow::Result<()> {
            anyhow::bail!("{name} refused")
        }

        fn prepend_path(&mut self, _name: &str, _dir: &Path) -> anyhow::Result<()> {
            Ok(())
        }

        fn is_loaded(&self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn refused_load_counts_as_failed_and_skips_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, rx) = mpsc::channel();
        let mut manager = PluginManager::new(
            PackageRoot::new(dir.path().join("packages")),
            LockStore::empty(dir.path().join("lock.json")),
            Box::new(RefusingHost),
            Notifier::new(tx),
        );
        std::fs::create_dir_all(manager.package_root().plugin_dir("present"))
            .expect("plugin dir");

        let report = manager.setup(vec![
            PluginSpec::new("/nowhere/present").with_hooks(Hooks {
                config: Some(Hook::func(|_| anyhow::bail!("config must not run"))),
                ..Hooks::default()
            }),
        ]);

        assert_eq!(report.loaded, 0);
        assert_eq!(report.failed, vec!["present".to_string()]);
        let notices = notices(&rx);
        assert!(notices
            .iter()
            .any(|notice| notice.level == Level::Error && notice.text.contains("present refused")));
        assert!(!notices
            .iter()
            .any(|notice| notice.text.contains("config must not run")));
    }

    #[test]
    fn local_plugin_is_prepended_and_never_locked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let local = dir.path().join("my-local");
        std::fs::create_dir_all(&local).expect("mkdir");
        let (mut manager, _rx) = manager(dir.path());

        let spec = PluginSpec::new("me/my-local").with_local_dir(&local);
        assert_eq!(
            manager.install(&spec),
            InstallOutcome::Loaded { cloned: false }
        );
        assert!(manager.host().is_loaded("my-local"));
        assert!(manager.lock_store().is_empty());
    }

    #[test]
    fn missing_local_directory_fails_without_cloning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut manager, rx) = manager(dir.path());

        let report = manager.setup(vec![SpecEntry::Full(crate::plugin::spec::FullSpec {
            url: "me/ghost".to_string(),
            dir: Some(dir.path().join("ghost")),
            ..Default::default()
        })]);

        assert_eq!(report.failed, vec!["ghost".to_string()]);
        assert_eq!(report.cloned, 0);
        assert!(notices(&rx)
            .iter()
            .any(|notice| notice.level == Level::Error && notice.text.contains("does not exist")));
    }
}

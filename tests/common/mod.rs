#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;

use tempfile::TempDir;

use tether::model::package_root::PackageRoot;
use tether::msg::{Msg, Notice, Notifier};
use tether::plugin::PluginManager;
use tether::plugin::host::RuntimePath;
use tether::plugin::lock::LockStore;

pub fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} in {}: {}",
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn commit(dir: &Path, message: &str) -> String {
    git(dir, &["commit", "-q", "--allow-empty", "-m", message]);
    head(dir)
}

pub fn head(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

/// Workspace with remotes under `remotes/` and a package root under `packages/`.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn packages(&self) -> PathBuf {
        self.path().join("packages")
    }

    pub fn lockfile(&self) -> PathBuf {
        self.path().join("tether-lock.json")
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.packages().join(name)
    }

    /// New remote repository `remotes/<owner>/<name>` with one commit on `main`.
    pub fn remote(&self, owner: &str, name: &str) -> PathBuf {
        let remote = self.path().join("remotes").join(owner).join(name);
        std::fs::create_dir_all(&remote).expect("remote dir");
        git(&remote, &["init", "-q", "-b", "main"]);
        commit(&remote, "initial");
        remote
    }

    pub fn manager(&self) -> (PluginManager, mpsc::Receiver<Msg>) {
        let (tx, rx) = mpsc::channel();
        let manager = PluginManager::new(
            PackageRoot::new(self.packages()),
            LockStore::load(self.lockfile()),
            Box::new(RuntimePath::default()),
            Notifier::new(tx),
        );
        (manager, rx)
    }

    pub fn lockfile_text(&self) -> String {
        std::fs::read_to_string(self.lockfile()).expect("read lockfile")
    }
}

pub fn url(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn notices(rx: &mpsc::Receiver<Msg>) -> Vec<Notice> {
    rx.try_iter()
        .filter_map(|msg| match msg {
            Msg::Notify(notice) => Some(notice),
            _ => None,
        })
        .collect()
}

//! Git backend.
//!
//! Every operation is a single `git` subprocess bound to one plugin's working
//! directory. Failures are classified by exit code and handed back as
//! [`GitError`]; nothing here aborts the process.

mod process;

use std::path::{Path, PathBuf};
use std::thread;

pub use process::{GitError, GitOutput};

/// Line reported by [`Git::new_commits`] when the target has nothing new.
pub const NO_NEW_COMMITS: &str = "no new commits";

#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Partial (blob-filtered) clone with submodules into this backend's directory.
    ///
    /// The parent directory must exist. A directory left behind by a failed
    /// clone is removed again.
    pub fn clone_repo(&self, url: &str) -> Result<(), GitError> {
        let parent = match self.dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // git runs inside `parent`, so the target is named relative to it.
        let target = self
            .dir
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| self.dir.to_string_lossy());

        let result = process::run_checked(
            parent,
            &[
                "clone",
                "--filter=blob:none",
                "--recurse-submodules",
                url,
                &*target,
            ],
        );

        if result.is_err() && self.dir.exists() {
            if let Err(err) = std::fs::remove_dir_all(&self.dir) {
                tracing::warn!(
                    "failed to remove partial clone {}: {err}",
                    self.dir.display()
                );
            }
        }

        result.map(|_| ())
    }

    pub fn checkout(&self, target: &str) -> Result<(), GitError> {
        process::run_checked(&self.dir, &["checkout", "--recurse-submodules", target])?;
        Ok(())
    }

    pub fn fetch(&self) -> Result<(), GitError> {
        process::run_checked(&self.dir, &["fetch", "--tags", "--force"])?;
        Ok(())
    }

    pub fn current_commit(&self) -> Result<String, GitError> {
        let output = process::run_checked(&self.dir, &["rev-parse", "HEAD"])?;
        Ok(output.stdout.trim().to_string())
    }

    /// Tag pointing exactly at `HEAD`, if any.
    pub fn current_tag(&self) -> Option<String> {
        let output =
            process::run_checked(&self.dir, &["describe", "--tags", "--exact-match"]).ok()?;
        let tag = output.stdout.trim();
        if tag.is_empty() {
            None
        } else {
            Some(tag.to_string())
        }
    }

    /// True when `commit` is reachable from a remote-tracking ref named `*/branch`.
    pub fn belongs_to_branch(&self, commit: &str, branch: &str) -> bool {
        let Ok(output) = process::run_checked(&self.dir, &["branch", "-a", "--contains", commit])
        else {
            return false;
        };

        let suffix = format!("/{branch}");
        output
            .stdout
            .lines()
            .filter_map(|line| {
                line.trim_start_matches('*')
                    .trim()
                    .split(" -> ")
                    .next()
                    .map(str::to_string)
            })
            .any(|reference| reference.starts_with("remotes/") && reference.ends_with(&suffix))
    }

    /// True when `maybe_ancestor` is an ancestor of (or equal to) `commit`.
    pub fn is_ancestor(&self, commit: &str, maybe_ancestor: &str) -> bool {
        process::run(
            &self.dir,
            &["merge-base", "--is-ancestor", maybe_ancestor, commit],
        )
        .map(|output| output.success())
        .unwrap_or(false)
    }

    /// One-line summaries of commits reachable from `target` but not from `HEAD`.
    pub fn new_commits(&self, target: &str) -> Result<Vec<String>, GitError> {
        let range = format!("HEAD..{target}");
        let output = process::run_checked(
            &self.dir,
            &["log", "--format=%h %s (%ad)", "--date=short", range.as_str()],
        )?;

        let lines: Vec<String> = output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();

        if lines.is_empty() {
            return Ok(vec![NO_NEW_COMMITS.to_string()]);
        }

        Ok(lines)
    }

    pub fn fetch_and_list_new_commits(&self, target: &str) -> Result<Vec<String>, GitError> {
        self.fetch()?;
        self.new_commits(target)
    }

    /// Run fetch then log on a background thread and hand the result to `on_done`.
    ///
    /// Concurrent requests are independent: no ordering, no cancellation.
    pub fn spawn_new_commits<F>(&self, target: String, on_done: F) -> thread::JoinHandle<()>
    where
        F: FnOnce(Result<Vec<String>, GitError>) + Send + 'static,
    {
        let git = self.clone();
        thread::spawn(move || {
            let result = git.fetch_and_list_new_commits(&target);
            on_done(result);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::sync::mpsc;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .expect("run git");
        assert!(
            output.status.success(),
            "git {args:?}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn commit(dir: &Path, message: &str) -> String {
        git(dir, &["commit", "-q", "--allow-empty", "-m", message]);
        git(dir, &["rev-parse", "HEAD"])
    }

    fn remote_with_history(root: &Path) -> (PathBuf, Vec<String>) {
        let remote = root.join("remote").join("demo.nvim");
        std::fs::create_dir_all(&remote).expect("remote dir");
        git(&remote, &["init", "-q", "-b", "main"]);
        let first = commit(&remote, "first");
        git(&remote, &["tag", "v1.0"]);
        let second = commit(&remote, "second");
        (remote, vec![first, second])
    }

    #[test]
    fn clone_checkout_and_inspect() {
        if !git_available() {
            return;
        }

        let root = tempfile::tempdir().expect("tempdir");
        let (remote, commits) = remote_with_history(root.path());
        let packages = root.path().join("packages");
        std::fs::create_dir_all(&packages).expect("packages");

        let backend = Git::new(packages.join("demo.nvim"));
        backend
            .clone_repo(&remote.to_string_lossy())
            .expect("clone");

        assert_eq!(backend.current_commit().expect("head"), commits[1]);
        assert_eq!(backend.current_tag(), None);

        backend.checkout("tags/v1.0").expect("checkout tag");
        assert_eq!(backend.current_commit().expect("head"), commits[0]);
        assert_eq!(backend.current_tag().as_deref(), Some("v1.0"));

        assert!(backend.is_ancestor(&commits[1], &commits[0]));
        assert!(!backend.is_ancestor(&commits[0], &commits[1]));
        assert!(backend.belongs_to_branch(&commits[0], "main"));
        assert!(!backend.belongs_to_branch(&commits[0], "stable"));

        let pending = backend.new_commits("origin/HEAD").expect("log");
        assert_eq!(pending.len(), 1);
        assert!(pending[0].contains("second"));
    }

    #[test]
    fn failed_clone_leaves_no_directory() {
        if !git_available() {
            return;
        }

        let root = tempfile::tempdir().expect("tempdir");
        let backend = Git::new(root.path().join("missing.nvim"));
        let err = backend
            .clone_repo(&root.path().join("nowhere").to_string_lossy())
            .expect_err("clone of missing remote");

        assert!(!err.stderr().is_empty());
        assert!(!backend.dir().exists());
    }

    #[test]
    fn clone_into_relative_directory_lands_in_place() {
        if !git_available() {
            return;
        }

        let root = tempfile::tempdir().expect("tempdir");
        let (remote, commits) = remote_with_history(root.path());

        // Relative paths resolve against the process working directory.
        let _cwd = crate::plugin::hooks::CWD_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let workspace = tempfile::tempdir_in(".").expect("relative tempdir");
        let relative = PathBuf::from(workspace.path().file_name().expect("name"));
        let packages = relative.join("packages");
        std::fs::create_dir_all(&packages).expect("packages");

        let backend = Git::new(packages.join("demo.nvim"));
        backend
            .clone_repo(&remote.to_string_lossy())
            .expect("clone");

        assert!(backend.dir().join(".git").exists());
        assert!(!packages.join(&packages).exists());
        assert_eq!(backend.current_commit().expect("head"), commits[1]);
    }

    #[test]
    fn background_query_reports_sentinel_when_current() {
        if !git_available() {
            return;
        }

        let root = tempfile::tempdir().expect("tempdir");
        let (remote, _) = remote_with_history(root.path());
        let backend = Git::new(root.path().join("demo.nvim"));
        backend
            .clone_repo(&remote.to_string_lossy())
            .expect("clone");

        let (tx, rx) = mpsc::channel();
        backend
            .spawn_new_commits("origin/HEAD".to_string(), move |result| {
                tx.send(result.map_err(|err| err.to_string()))
                    .expect("send result");
            })
            .join()
            .expect("join");

        let lines = rx.recv().expect("result").expect("query");
        assert_eq!(lines, vec![NO_NEW_COMMITS.to_string()]);
    }
}

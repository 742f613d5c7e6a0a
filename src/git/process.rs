use std::path::Path;
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {command} exited with {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },
}

impl GitError {
    /// Captured standard error of a failed invocation, or the spawn error text.
    pub fn stderr(&self) -> String {
        match self {
            GitError::Spawn { source, .. } => source.to_string(),
            GitError::Failed { stderr, .. } => stderr.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run one `git` invocation in `dir` and capture everything it printed.
///
/// A non-zero exit is not an error at this layer; callers classify it.
pub fn run(dir: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
    tracing::debug!("git {} (in {})", args.join(" "), dir.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|source| GitError::Spawn {
            command: command_label(args),
            source,
        })?;

    Ok(GitOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Like [`run`], but a non-zero exit becomes [`GitError::Failed`].
pub fn run_checked(dir: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
    let output = run(dir, args)?;
    if output.success() {
        return Ok(output);
    }

    Err(GitError::Failed {
        command: command_label(args),
        code: output.code,
        stderr: output.stderr.trim().to_string(),
    })
}

fn command_label(args: &[&str]) -> String {
    args.first().copied().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_invocation_carries_stderr() {
        if Command::new("git").arg("--version").output().is_err() {
            return;
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_checked(dir.path(), &["rev-parse", "HEAD"]).expect_err("not a repo");

        match &err {
            GitError::Failed { command, code, .. } => {
                assert_eq!(command, "rev-parse");
                assert_ne!(*code, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.stderr().is_empty());
    }

    #[test]
    fn unchecked_run_reports_exit_code() {
        if Command::new("git").arg("--version").output().is_err() {
            return;
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let output = run(dir.path(), &["--version"]).expect("git --version");
        assert!(output.success());
        assert!(output.stdout.starts_with("git version"));
    }
}

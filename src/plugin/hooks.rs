use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Serializes every temporary working-directory switch in the process.
pub(crate) static CWD_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Load,
    Init,
    Build,
    Config,
}

impl HookKind {
    pub fn label(&self) -> &'static str {
        match self {
            HookKind::Load => "load",
            HookKind::Init => "init",
            HookKind::Build => "build",
            HookKind::Config => "config",
        }
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("{hook} hook failed: {message}")]
    Failed { hook: &'static str, message: String },
    #[error("{hook} hook reported failure")]
    Declined { hook: &'static str },
}

/// What a hook gets to see about the plugin it runs for.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub name: String,
    pub dir: PathBuf,
}

pub type HookFn = dyn Fn(&HookContext) -> anyhow::Result<bool> + Send + Sync;

#[derive(Clone)]
pub enum Hook {
    /// Shell command run with `sh -c` inside the plugin directory; exit 0 is `true`.
    Shell(String),
    Func(Arc<HookFn>),
}

impl Hook {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&HookContext) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Hook::Func(Arc::new(f))
    }

    pub fn call(&self, ctx: &HookContext) -> anyhow::Result<bool> {
        match self {
            Hook::Shell(command) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(command);
                if ctx.dir.is_dir() {
                    cmd.current_dir(&ctx.dir);
                }
                let status = cmd.env("TETHER_PLUGIN", &ctx.name).status()?;
                Ok(status.success())
            }
            Hook::Func(f) => f(ctx),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Shell(command) => f.debug_tuple("Shell").field(command).finish(),
            Hook::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Optional lifecycle capabilities of one plugin.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub load: Option<Hook>,
    pub init: Option<Hook>,
    pub build: Option<Hook>,
    pub config: Option<Hook>,
}

impl Hooks {
    pub fn get(&self, kind: HookKind) -> Option<&Hook> {
        match kind {
            HookKind::Load => self.load.as_ref(),
            HookKind::Init => self.init.as_ref(),
            HookKind::Build => self.build.as_ref(),
            HookKind::Config => self.config.as_ref(),
        }
    }

    /// Evaluate the load gate. An absent hook always lets the plugin through.
    pub fn allows_load(&self, ctx: &HookContext) -> Result<bool, HookError> {
        let Some(hook) = self.load.as_ref() else {
            return Ok(true);
        };

        hook.call(ctx).map_err(|err| HookError::Failed {
            hook: HookKind::Load.label(),
            message: format!("{err:#}"),
        })
    }

    /// Run an init/build/config hook if present. `build` runs with the
    /// process working directory switched to the plugin directory.
    pub fn run(&self, kind: HookKind, ctx: &HookContext) -> Result<(), HookError> {
        let Some(hook) = self.get(kind) else {
            return Ok(());
        };

        let outcome = if kind == HookKind::Build {
            within_dir(&ctx.dir, || hook.call(ctx))
        } else {
            hook.call(ctx)
        };

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(HookError::Declined { hook: kind.label() }),
            Err(err) => Err(HookError::Failed {
                hook: kind.label(),
                message: format!("{err:#}"),
            }),
        }
    }
}

/// Restores the previous working directory when dropped.
struct CwdGuard {
    previous: PathBuf,
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(
                "failed to restore working directory {}: {err}",
                self.previous.display()
            );
        }
    }
}

fn within_dir<T>(dir: &Path, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let previous = std::env::current_dir()?;
    std::env::set_current_dir(dir)?;
    let _guard = CwdGuard { previous };
    f()
}

//! Divergence between what a plugin declares, what the lockfile records and
//! what is actually checked out.

use crate::git::Git;
use crate::model::package_root::PackageRoot;
use crate::plugin::host::Host;
use crate::plugin::lock::LockStore;
use crate::plugin::manager::Registry;
use crate::plugin::spec::{Pinning, PluginSpec};

/// Marker appended to a pin description when the checkout does not honor it.
pub const DRIFT_MARKER: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinStatus {
    pub description: String,
    pub drifted: bool,
}

impl PinStatus {
    pub fn comment(&self) -> String {
        if self.drifted {
            format!("{}{DRIFT_MARKER}", self.description)
        } else {
            self.description.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDrift {
    InSync,
    /// Checkout descends from the locked commit.
    Newer,
    /// Locked commit is not an ancestor of the checkout.
    Diverged,
    Unlocked,
    /// Repository state could not be read.
    Unknown,
}

impl LockDrift {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            LockDrift::InSync => None,
            LockDrift::Newer => Some("newer than lock"),
            LockDrift::Diverged => Some("diverged from lock"),
            LockDrift::Unlocked => Some("not locked"),
            LockDrift::Unknown => Some("unknown state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginStatus {
    pub name: String,
    pub commit: Option<String>,
    pub locked: Option<String>,
    pub pin: PinStatus,
    pub lock: LockDrift,
}

impl PluginStatus {
    /// One presentation-ready line: name, short commit, pin comment, lock drift.
    pub fn line(&self) -> String {
        let commit = self
            .commit
            .as_deref()
            .map(short_hash)
            .unwrap_or("not installed");

        let mut parts = vec![self.name.clone(), commit.to_string()];
        let comment = self.pin.comment();
        if !comment.is_empty() {
            parts.push(format!("({comment})"));
        }
        if let Some(label) = self.lock.label() {
            match (&self.locked, self.lock) {
                (Some(locked), LockDrift::Newer | LockDrift::Diverged) => {
                    parts.push(format!("[{label} {}]", short_hash(locked)));
                }
                _ => parts.push(format!("[{label}]")),
            }
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusView {
    pub plugins: Vec<PluginStatus>,
    pub loaded: Vec<String>,
    pub not_loaded: Vec<String>,
    pub unmanaged: Vec<String>,
    pub outdated_lock: Vec<String>,
}

pub fn compute(
    registry: &Registry,
    lock: &LockStore,
    root: &PackageRoot,
    host: &dyn Host,
) -> StatusView {
    let mut view = StatusView::default();

    for spec in registry.iter() {
        if host.is_loaded(&spec.name) {
            view.loaded.push(spec.name.clone());
        } else {
            view.not_loaded.push(spec.name.clone());
        }

        if spec.is_local() {
            continue;
        }

        let dir = root.plugin_dir(&spec.name);
        let locked = lock.commit(&spec.name);
        if dir.is_dir() {
            view.plugins
                .push(plugin_status(spec, &Git::new(dir), locked));
        } else {
            view.plugins.push(PluginStatus {
                name: spec.name.clone(),
                commit: None,
                locked: locked.map(str::to_string),
                pin: PinStatus {
                    description: pin_description(&spec.pinning),
                    drifted: false,
                },
                lock: LockDrift::Unknown,
            });
        }
    }

    view.unmanaged = root
        .dir_names()
        .into_iter()
        .filter(|name| !registry.contains(name))
        .collect();

    view.outdated_lock = lock
        .names()
        .filter(|name| !registry.contains(name))
        .map(str::to_string)
        .collect();

    view
}

pub fn plugin_status(spec: &PluginSpec, git: &Git, locked: Option<&str>) -> PluginStatus {
    let description = pin_description(&spec.pinning);

    let Ok(current) = git.current_commit() else {
        return PluginStatus {
            name: spec.name.clone(),
            commit: None,
            locked: locked.map(str::to_string),
            pin: PinStatus {
                description,
                drifted: false,
            },
            lock: LockDrift::Unknown,
        };
    };

    let drifted = match &spec.pinning {
        Pinning::Commit(pinned) => !current
            .to_ascii_lowercase()
            .starts_with(&pinned.to_ascii_lowercase()),
        Pinning::Tag(tag) => git.current_tag().as_deref() != Some(tag.as_str()),
        Pinning::Branch(branch) => !git.belongs_to_branch(&current, branch),
        Pinning::None => false,
    };

    let lock = match locked {
        None => LockDrift::Unlocked,
        Some(locked) if locked == current => LockDrift::InSync,
        Some(locked) if git.is_ancestor(&current, locked) => LockDrift::Newer,
        Some(_) => LockDrift::Diverged,
    };

    PluginStatus {
        name: spec.name.clone(),
        commit: Some(current),
        locked: locked.map(str::to_string),
        pin: PinStatus {
            description,
            drifted,
        },
        lock,
    }
}

fn pin_description(pinning: &Pinning) -> String {
    match pinning {
        Pinning::None => String::new(),
        Pinning::Branch(branch) => format!("branch {branch}"),
        Pinning::Tag(tag) => format!("tag {tag}"),
        Pinning::Commit(commit) => format!("commit {}", short_hash(commit)),
    }
}

pub fn short_hash(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

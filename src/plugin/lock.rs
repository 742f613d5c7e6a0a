use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to write lockfile {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode lock entry {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub commit: String,
}

impl LockEntry {
    pub fn new(commit: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
        }
    }
}

/// Persisted name -> commit mapping.
#[derive(Debug, Clone, Default)]
pub struct LockStore {
    path: PathBuf,
    entries: BTreeMap<String, LockEntry>,
}

impl LockStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the lockfile. A missing or malformed file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => parse(&raw).unwrap_or_else(|err| {
                tracing::warn!("ignoring malformed lockfile {}: {err}", path.display());
                BTreeMap::new()
            }),
            Err(err) => {
                tracing::debug!("no lockfile at {}: {err}", path.display());
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&LockEntry> {
        self.entries.get(name)
    }

    pub fn commit(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.commit.as_str())
    }

    /// Record `commit` for `name`. Returns true when the entry changed.
    pub fn set(&mut self, name: &str, commit: &str) -> bool {
        let previous = self
            .entries
            .insert(name.to_string(), LockEntry::new(commit));
        previous.is_none_or(|entry| entry.commit != commit)
    }

    pub fn remove(&mut self, name: &str) -> Option<LockEntry> {
        self.entries.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry rejected by `keep`; returns how many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|name, _| keep(name));
        before - self.entries.len()
    }

    /// Deterministic text form: sorted keys, one entry per line.
    pub fn render(&self) -> Result<String, LockError> {
        render(&self.entries)
    }

    /// Rewrite the whole lockfile.
    pub fn save(&self) -> Result<(), LockError> {
        let text = self.render()?;
        let write_err = |source| LockError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = self.path.with_extension("tmp");
        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.flush()?;
            fs::rename(&tmp, &self.path)
        })();

        result.map_err(write_err)?;
        tracing::debug!(
            "wrote {} lock entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn parse(raw: &str) -> Result<BTreeMap<String, LockEntry>, serde_json::Error> {
    serde_json::from_str(raw)
}

fn render(entries: &BTreeMap<String, LockEntry>) -> Result<String, LockError> {
    let encode = |name: &str, value: &str| {
        serde_json::to_string(value).map_err(|source| LockError::Encode {
            name: name.to_string(),
            source,
        })
    };

    let lines = entries
        .iter()
        .map(|(name, entry)| {
            Ok(format!(
                "  {}: {{\"commit\": {}}}",
                encode(name, name)?,
                encode(name, &entry.commit)?
            ))
        })
        .collect::<Result<Vec<_>, LockError>>()?;

    if lines.is_empty() {
        return Ok("{\n}\n".to_string());
    }

    Ok(format!("{{\n{}\n}}\n", lines.join(",\n")))
}

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Directory under which every cloned plugin lives, one subdirectory per name.
#[derive(Debug, Clone)]
pub struct PackageRoot {
    root: PathBuf,
}

impl PackageRoot {
    /// A relative root is anchored to the current working directory here, so
    /// later directory switches (git subprocesses, build hooks) cannot move it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Names of the immediate subdirectories, sorted case-insensitively.
    pub fn dir_names(&self) -> Vec<String> {
        if !self.root.is_dir() {
            return Vec::new();
        }

        let mut names: Vec<String> = WalkBuilder::new(&self.root)
            .max_depth(Some(1))
            .standard_filters(false)
            .build()
            .flatten()
            .filter_map(|entry| {
                if entry.path() == self.root {
                    return None;
                }

                let metadata = entry.metadata().ok()?;
                if !metadata.is_dir() {
                    return None;
                }
                entry.file_name().to_str().map(str::to_string)
            })
            .collect();

        names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));
        names
    }

    /// Recursively remove one plugin directory.
    pub fn remove(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_dir_all(self.plugin_dir(name))
    }
}

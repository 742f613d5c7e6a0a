use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The editor side of loading: the engine decides *when*, the host decides *how*.
pub trait Host: Send {
    /// Activate an installed package by name.
    fn load_package(&mut self, name: &str, dir: &Path) -> anyhow::Result<()>;

    /// Put a local plugin directory at the front of the search path.
    fn prepend_path(&mut self, name: &str, dir: &Path) -> anyhow::Result<()>;

    /// Whether `name` is currently on the active load path.
    fn is_loaded(&self, name: &str) -> bool;
}

/// In-process host used by the CLI: remembers the search path and loaded names.
#[derive(Debug, Default)]
pub struct RuntimePath {
    search_path: Vec<PathBuf>,
    loaded: HashSet<String>,
}

impl RuntimePath {
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }
}

impl Host for RuntimePath {
    fn load_package(&mut self, name: &str, dir: &Path) -> anyhow::Result<()> {
        anyhow::ensure!(dir.is_dir(), "package directory {} is missing", dir.display());
        if !self.search_path.iter().any(|path| path == dir) {
            self.search_path.push(dir.to_path_buf());
        }
        self.loaded.insert(name.to_string());
        Ok(())
    }

    fn prepend_path(&mut self, name: &str, dir: &Path) -> anyhow::Result<()> {
        self.search_path.retain(|path| path != dir);
        self.search_path.insert(0, dir.to_path_buf());
        self.loaded.insert(name.to_string());
        Ok(())
    }

    fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }
}

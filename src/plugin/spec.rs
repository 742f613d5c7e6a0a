use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::plugin::hooks::{Hook, Hooks};

static SHORT_FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("valid short-form remote regex")
});

/// How a plugin's checkout target is chosen. Priority: commit > tag > branch > none.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Pinning {
    #[default]
    None,
    Branch(String),
    Tag(String),
    Commit(String),
}

impl Pinning {
    pub fn from_fields(branch: Option<&str>, tag: Option<&str>, commit: Option<&str>) -> Self {
        let non_empty = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        if let Some(commit) = non_empty(commit) {
            Pinning::Commit(commit)
        } else if let Some(tag) = non_empty(tag) {
            Pinning::Tag(tag)
        } else if let Some(branch) = non_empty(branch) {
            Pinning::Branch(branch)
        } else {
            Pinning::None
        }
    }
}

/// One element of the declared plugin list, as written by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SpecEntry {
    Bare(String),
    Full(FullSpec),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FullSpec {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub load: Option<String>,
    #[serde(default)]
    pub init: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub config: Option<String>,
}

impl From<&str> for SpecEntry {
    fn from(url: &str) -> Self {
        SpecEntry::Bare(url.to_string())
    }
}

impl From<FullSpec> for SpecEntry {
    fn from(full: FullSpec) -> Self {
        SpecEntry::Full(full)
    }
}

/// Normalized plugin configuration held in the registry.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub name: String,
    pub url: String,
    pub pinning: Pinning,
    pub local_dir: Option<PathBuf>,
    pub hooks: Hooks,
}

impl PluginSpec {
    pub fn new(url: impl Into<String>) -> Self {
        let url = expand_remote(&url.into());
        Self {
            name: plugin_name(&url),
            url,
            pinning: Pinning::None,
            local_dir: None,
            hooks: Hooks::default(),
        }
    }

    pub fn with_pinning(mut self, pinning: Pinning) -> Self {
        self.pinning = pinning;
        self
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(expand_tilde(&dir.into()));
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn is_local(&self) -> bool {
        self.local_dir.is_some()
    }
}

impl From<SpecEntry> for PluginSpec {
    fn from(entry: SpecEntry) -> Self {
        match entry {
            SpecEntry::Bare(url) => PluginSpec::new(url),
            SpecEntry::Full(full) => {
                let shell = |command: Option<String>| command.map(Hook::Shell);
                let mut spec = PluginSpec::new(full.url)
                    .with_pinning(Pinning::from_fields(
                        full.branch.as_deref(),
                        full.tag.as_deref(),
                        full.commit.as_deref(),
                    ))
                    .with_hooks(Hooks {
                        load: shell(full.load),
                        init: shell(full.init),
                        build: shell(full.build),
                        config: shell(full.config),
                    });
                if let Some(dir) = full.dir {
                    spec = spec.with_local_dir(dir);
                }
                spec
            }
        }
    }
}

/// `owner/repo` expands to a GitHub remote; everything else is passed to git as is.
pub fn expand_remote(url: &str) -> String {
    let url = url.trim();
    if SHORT_FORM_RE.is_match(url) && !url.starts_with('.') {
        return format!("https://github.com/{url}.git");
    }
    url.to_string()
}

/// Plugin name: final path segment of the remote, without `.git`.
pub fn plugin_name(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed
        .rsplit(['/', ':', '\\'])
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("plugin")
        .to_string()
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if !text.starts_with('~') {
        return path.to_path_buf();
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        let home = base_dirs.home_dir().to_string_lossy();
        return PathBuf::from(text.replacen('~', &home, 1));
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_come_from_the_last_segment() {
        assert_eq!(plugin_name("org/plugin-a"), "plugin-a");
        assert_eq!(plugin_name("https://github.com/org/plugin-b.git"), "plugin-b");
        assert_eq!(plugin_name("git@github.com:org/plugin-c.git"), "plugin-c");
        assert_eq!(plugin_name("git@host:plugin-d"), "plugin-d");
        assert_eq!(plugin_name("/srv/git/plugin-e/"), "plugin-e");
    }

    #[test]
    fn short_form_expands_to_github() {
        assert_eq!(
            expand_remote("org/plugin-a"),
            "https://github.com/org/plugin-a.git"
        );
        assert_eq!(expand_remote("/srv/git/plugin-a"), "/srv/git/plugin-a");
        assert_eq!(expand_remote("./vendor/plugin"), "./vendor/plugin");
        assert_eq!(
            expand_remote("https://example.com/x/y.git"),
            "https://example.com/x/y.git"
        );
    }

    #[test]
    fn pinning_priority_is_commit_tag_branch() {
        assert_eq!(
            Pinning::from_fields(Some("dev"), Some("v1"), Some("abc123")),
            Pinning::Commit("abc123".to_string())
        );
        assert_eq!(
            Pinning::from_fields(Some("dev"), Some("v1"), None),
            Pinning::Tag("v1".to_string())
        );
        assert_eq!(
            Pinning::from_fields(Some("dev"), None, Some("  ")),
            Pinning::Branch("dev".to_string())
        );
        assert_eq!(Pinning::from_fields(None, None, None), Pinning::None);
    }

    #[test]
    fn entries_deserialize_from_strings_and_tables() {
        #[derive(Deserialize)]
        struct List {
            plugins: Vec<SpecEntry>,
        }

        let list: List = toml::from_str(
            r#"
            plugins = [
                "org/plugin-a",
                { url = "org/plugin-b", branch = "stable", build = "make" },
                { url = "me/local", dir = "/opt/local-plugin" },
            ]
            "#,
        )
        .expect("parse plugin list");

        let specs: Vec<PluginSpec> = list.plugins.into_iter().map(PluginSpec::from).collect();
        assert_eq!(specs[0].name, "plugin-a");
        assert_eq!(specs[0].pinning, Pinning::None);
        assert_eq!(specs[1].pinning, Pinning::Branch("stable".to_string()));
        assert!(matches!(specs[1].hooks.build, Some(Hook::Shell(ref cmd)) if cmd == "make"));
        assert!(specs[2].is_local());
        assert_eq!(
            specs[2].local_dir.as_deref(),
            Some(Path::new("/opt/local-plugin"))
        );
    }
}

use crate::plugin::spec::{Pinning, PluginSpec};

/// Git ref a plugin should be checked out to, according to its pinning.
pub fn resolve(spec: &PluginSpec) -> String {
    resolve_pinning(&spec.pinning)
}

pub fn resolve_pinning(pinning: &Pinning) -> String {
    match pinning {
        Pinning::Commit(commit) => commit.clone(),
        Pinning::Tag(tag) => format!("tags/{tag}"),
        Pinning::Branch(branch) => format!("origin/{branch}"),
        Pinning::None => "origin/HEAD".to_string(),
    }
}

//! Declarative, lockfile-backed plugin manager for editors.
//!
//! [`plugin::PluginManager`] converges an ordered list of plugin specs to
//! disk, records the result in a lockfile, and reports how the checked-out
//! state drifts from both.

pub mod git;
pub mod model;
pub mod msg;
pub mod plugin;

pub mod hooks;
pub mod host;
pub mod installer;
pub mod lock;
pub mod manager;
pub mod resolver;
pub mod spec;
pub mod status;

pub use manager::PluginManager;

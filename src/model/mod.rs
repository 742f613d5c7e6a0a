pub mod config;
pub mod package_root;

pub mod config_storage;
pub mod paths;

pub use crate::config_storage::ConfigStorage;
pub use crate::paths::DoksPaths;

// Configuration module

pub mod constants;
mod loader;
mod settings;

pub use loader::{load_config, REGISTRY_PATH_ENV};
pub use settings::{Config, MeshConfig, RegistryConfig, SessionConfig};

// src/config/mod.rs

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{RawRunConfig, RelaunchSection, RunConfig};
pub use validate::parse_duration;

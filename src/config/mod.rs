// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] holds the raw TOML shapes and the validated types.
//! - [`validate`] turns a `RawConfigFile` into a `ConfigFile`.
//! - [`loader`] reads files, expands `include_repositories`, and provides
//!   the reloadable [`ConfigProvider`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, ConfigProvider};
pub use model::{
    ActionConfig, AgentSection, AgentSettings, ConfigFile, RawAction, RawConfigFile,
    RawRepository, RepositoryConfig, WatchSpec,
};

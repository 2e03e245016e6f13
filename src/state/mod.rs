// src/state/mod.rs

//! Durable per-repository state.
//!
//! - [`model`] defines `GlobalState` / `RepositoryState` (the JSON schema).
//! - [`store`] owns the single shared copy, with read-mostly locking and
//!   debounced persistence.

pub mod model;
pub mod store;

pub use model::{GlobalState, RepositoryState, STATE_VERSION};
pub use store::{StateStore, DEFAULT_DEBOUNCE, STATE_FILE_NAME};

// src/watch/mod.rs

//! Remote change detection.
//!
//! This module is responsible for:
//! - Compiling per-repository watch patterns ([`patterns`]).
//! - Talking to the version-control client ([`vcs`]).
//! - Turning "remote head vs. last seen commit" into a list of changed
//!   watched paths ([`detector`]).
//!
//! It does **not** know about state persistence or actions.

pub mod detector;
pub mod patterns;
pub mod vcs;

pub use detector::{ChangeDetector, Detection};
pub use patterns::{WatchPattern, WatchSet};
pub use vcs::{GitCli, VcsFuture, VersionControl};

//! mstat-core: shared types, errors, and privilege handling for mstat
//!
//! This crate provides the foundational types used by all mstat crates:
//! - Error types and Result alias
//! - Utility functions (memory size parsing, UID/GID queries)
//! - Runtime capability detection (root, cgroup v2, memory controller)
//! - Dropping to the real user and group ids before exec'ing a target

pub mod capabilities;
pub mod error;
pub mod privilege;
pub mod util;

pub use error::{MstatError, Result};

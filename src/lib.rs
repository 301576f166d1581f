/*!
 * twinsweep - byte-identical duplicate file finder
 *
 * Walks one or more directory trees, groups files that are byte-for-byte
 * identical, and reports or removes the duplicates. Identification proceeds
 * through staged, increasingly expensive comparisons (size, permissions,
 * partial digest, full digest) before any byte-for-byte confirmation, so
 * large non-duplicate trees are ruled out cheaply.
 */

pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use config::{Cli, DeletionMode, OrderBy, RunConfig};
pub use core::run;
pub use error::{DedupError, ErrorCategory, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

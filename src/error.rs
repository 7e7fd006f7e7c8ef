//! Error types for the build pipeline.
//!
//! Configuration problems that can degrade (unknown language, unnamed app)
//! are logged as warnings instead and never reach these types.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while assembling bundles and registering assets.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read bundle directory `{}`", .0.display())]
    BundleUnreadable(PathBuf, #[source] std::io::Error),

    #[error("bundle `{0}` is nested inside itself")]
    Cycle(String),

    #[error("two assets registered under url `{0}`")]
    DuplicateUrl(String),

    #[error("symlink `{0}` resolves to itself")]
    SelfSymlink(String),
}

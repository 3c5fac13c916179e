//! Domain layer: pure types, parsing and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, `std::fs`, or `std::process`. All functions are synchronous and
//! take data in, returning data out.

pub mod config;
pub mod error;
pub mod manifest;
pub mod policy;
pub mod seed;

pub use config::{GuestIdentity, ImageSource, RunConfig, RunParams, WorkPaths};
pub use error::{ConfigError, IntegrityError, ToolError};
pub use manifest::ChecksumManifest;
pub use policy::{FailurePolicy, Severity, Step};
pub use seed::CloudInitSeed;

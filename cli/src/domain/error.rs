//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, `std::fs`, or `std::process`. All error types implement
//! `thiserror::Error` and convert to `anyhow::Error` via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

// ── Configuration errors ──────────────────────────────────────────────────────

/// Invalid or unsupported run configuration. Reported before any network or
/// tool call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Please specify a different name for guest image via -o (got '{0}', which is the cloud image name)")]
    OutputCollidesWithCloudImage(String),

    #[error("The output file should be qcow2 format with the file extension as .qcow2 (got '{0}')")]
    OutputSuffix(String),

    #[error("Only support download the image from {0}; -c (customized image) is not implemented")]
    CustomImageUnsupported(String),

    #[error("Local package repository not found: {}", .0.display())]
    RepoNotFound(PathBuf),

    #[error("Guest setup file not found: {}", .0.display())]
    MissingSetupFile(PathBuf),

    #[error("Invalid image size: {0}G. Must be greater than zero.")]
    InvalidSize(u32),

    #[error("Invalid hostname '{0}': expected dot-separated labels of letters, digits and inner hyphens, at most 253 characters")]
    InvalidHostname(String),

    #[error("Invalid username '{0}': must match ^[a-z_][a-z0-9_-]{{0,31}}$")]
    InvalidUsername(String),

    #[error("Generated cloud-init {file} is not valid YAML: {reason}")]
    InvalidSeed { file: &'static str, reason: String },
}

// ── Integrity errors ──────────────────────────────────────────────────────────

/// Checksum manifest and image verification failures.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Invalid SHA256SUMS file: no entry for '{0}'")]
    MissingEntry(String),

    #[error("Checksum of '{filename}' still does not match after {attempts} download attempts")]
    VerificationExhausted { filename: String, attempts: u32 },
}

// ── Tool errors ───────────────────────────────────────────────────────────────

/// External tool invocation failures.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Please install {tool} (provided by {package})")]
    Missing {
        tool: &'static str,
        package: &'static str,
    },

    #[error("{step}: {program} exited with {status}{detail}")]
    Failed {
        step: &'static str,
        program: String,
        status: String,
        detail: String,
    },
}

impl ToolError {
    /// Build a `Failed` error, attaching the last line of stderr when present.
    #[must_use]
    pub fn failed(step: &'static str, program: &str, status: &str, stderr: &[u8]) -> Self {
        let stderr = String::from_utf8_lossy(stderr);
        let detail = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| format!(": {}", l.trim()))
            .unwrap_or_default();
        Self::Failed {
            step,
            program: program.to_string(),
            status: status.to_string(),
            detail,
        }
    }
}

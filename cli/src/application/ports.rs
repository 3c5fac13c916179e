//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`
//! or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so external tools can be mocked in tests.
///
/// Every image-building tool (`qemu-img`, `virt-customize`, `virt-install`,
/// `virsh`, `genisoimage`) is invoked through this trait and nothing else.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with inherited stdio and return only its exit status.
    /// No timeout: used for long in-image commands whose progress the user
    /// should see.
    async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus>;
}

// ── Download Port ─────────────────────────────────────────────────────────────

/// Fetches a URL to a local file.
pub trait Downloader {
    /// Download `url` to `dest`, replacing any existing file.
    ///
    /// Implementations must not leave a partially written file at `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success HTTP status.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Filesystem Ports ──────────────────────────────────────────────────────────

/// Abstracts file hashing operations.
pub trait FileHasher {
    /// Compute the lowercase hex SHA-256 of a file.
    fn sha256_file(&self, path: &Path) -> Result<String>;
}

/// Abstracts the local filesystem operations the build performs.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Append bytes, creating the file if needed.
    fn append(&self, path: &Path, content: &[u8]) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Byte-for-byte copy; returns the number of bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    /// Move a file, falling back to copy and remove across filesystems.
    fn move_file(&self, from: &Path, to: &Path) -> Result<()>;
    /// OR `mode` into the file's permission bits.
    fn add_permissions(&self, path: &Path, mode: u32) -> Result<()>;
}

// ── Host Inspection Port ──────────────────────────────────────────────────────

/// Locates executables on the host.
pub trait ToolLocator {
    /// Full path of `tool` if it is an executable on `PATH`.
    fn locate(&self, tool: &str) -> Option<PathBuf>;
}

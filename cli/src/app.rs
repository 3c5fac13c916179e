//! Application context: the production adapters and output state shared
//! by the build command.
//!
//! `AppContext` is constructed once in `Cli::run()` and passed by reference,
//! so adding a cross-cutting concern changes only this struct.

use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::preflight::DEFAULT_PRIVILEGE_DELAY;
use crate::domain::config::WorkPaths;
use crate::domain::policy::FailurePolicy;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::download::UreqDownloader;
use crate::infra::fs::HostFs;
use crate::infra::tools::PathLocator;
use crate::output::{OutputContext, TerminalReporter};

/// Output rendering flags passed from the top-level CLI.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Unified application context passed to the build command.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Runs qemu-img, virt-*, virsh, genisoimage and `id`.
    pub runner: TokioCommandRunner,
    pub downloader: UreqDownloader,
    pub fs: HostFs,
    pub locator: PathLocator,
    /// Transient file locations, under the system temp directory.
    pub paths: WorkPaths,
    pub policy: FailurePolicy,
    /// Host proxy environment copied into the image.
    pub host_env: PathBuf,
    /// Pause after the non-root warning.
    pub privilege_delay: Duration,
}

impl AppContext {
    /// Construct an `AppContext` wired to the host.
    #[must_use]
    pub fn new(flags: &OutputFlags) -> Self {
        let output = OutputContext::new(flags.no_color, flags.quiet);
        let downloader = UreqDownloader::new(output.show_progress());
        Self {
            output,
            runner: TokioCommandRunner::default(),
            downloader,
            fs: HostFs,
            locator: PathLocator::from_env(),
            paths: WorkPaths::under(&std::env::temp_dir()),
            policy: FailurePolicy::default(),
            host_env: PathBuf::from(crate::application::services::guest_setup::HOST_ENVIRONMENT),
            privilege_delay: DEFAULT_PRIVILEGE_DELAY,
        }
    }

    /// Returns a `TerminalReporter` borrowing this context's output.
    #[must_use]
    pub fn terminal_reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }
}

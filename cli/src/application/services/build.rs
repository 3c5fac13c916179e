//! Application service: guest image build use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{
    CommandRunner, Downloader, FileHasher, LocalFs, ProgressReporter, ToolLocator,
};
use crate::application::services::{
    acquire::acquire_base_image,
    cloud_init::configure_cloud_init,
    finalize::{promote, remove_manifest},
    guest_setup::inject_guest_setup,
    materialize::materialize,
    preflight::{check_privileges, check_required_tools},
};
use crate::domain::config::{RunConfig, WorkPaths};
use crate::domain::policy::FailurePolicy;

pub struct BuildOptions<'a> {
    pub paths: &'a WorkPaths,
    pub policy: &'a FailurePolicy,
    /// Host file whose proxy settings are copied into the image.
    pub host_env: &'a Path,
    /// Pause after the non-root warning.
    pub privilege_delay: Duration,
}

/// Outcome of the `build_image` use-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub output: PathBuf,
    pub base_sha256: String,
    /// `false` when an existing verified base image was reused.
    pub base_downloaded: bool,
    /// `false` when the tolerated resize or grow step failed.
    pub resized: bool,
}

/// Build the guest image: preflight, acquire, materialize, configure
/// cloud-init, run guest setup, promote. The checksum manifest is removed
/// whether or not the build succeeds, including when preflight fails.
///
/// # Errors
///
/// Returns the first fatal error of any stage. The working image is then
/// left at its temporary path and never moved to the output path.
pub async fn build_image(
    cfg: &RunConfig,
    runner: &impl CommandRunner,
    downloader: &impl Downloader,
    fs: &(impl LocalFs + FileHasher),
    locator: &impl ToolLocator,
    reporter: &impl ProgressReporter,
    opts: BuildOptions<'_>,
) -> Result<BuildOutcome> {
    let result = provision(cfg, runner, downloader, fs, locator, reporter, &opts).await;
    let cleanup = remove_manifest(cfg, fs);
    match (result, cleanup) {
        (Ok(outcome), Ok(())) => Ok(outcome),
        (Ok(outcome), Err(e)) => {
            reporter.warn(&format!("failed to remove checksum manifest: {e:#}"));
            Ok(outcome)
        }
        (Err(e), cleanup) => {
            if let Err(ce) = cleanup {
                tracing::warn!(error = %format!("{ce:#}"), "manifest cleanup failed");
            }
            Err(e)
        }
    }
}

async fn provision(
    cfg: &RunConfig,
    runner: &impl CommandRunner,
    downloader: &impl Downloader,
    fs: &(impl LocalFs + FileHasher),
    locator: &impl ToolLocator,
    reporter: &impl ProgressReporter,
    opts: &BuildOptions<'_>,
) -> Result<BuildOutcome> {
    let BuildOptions {
        paths,
        policy,
        host_env,
        privilege_delay,
    } = *opts;

    check_required_tools(locator)?;
    check_privileges(runner, reporter, privilege_delay).await;

    let base = acquire_base_image(cfg, downloader, fs, reporter)?;
    let working = materialize(cfg, &base, paths, runner, fs, reporter, policy).await?;
    configure_cloud_init(cfg, &working, paths, runner, fs, reporter, policy).await?;
    inject_guest_setup(cfg, &working, host_env, runner, fs, reporter, policy).await?;
    let output = promote(&working, cfg, fs, reporter)?;

    Ok(BuildOutcome {
        output,
        base_sha256: base.sha256,
        base_downloaded: base.downloaded,
        resized: working.resized,
    })
}

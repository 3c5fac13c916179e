//! Guest setup injection: copy the setup script, its helpers and an
//! optional package repository into the image and run the script there.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::application::ports::{CommandRunner, LocalFs, ProgressReporter};
use crate::application::services::materialize::WorkingImage;
use crate::application::services::steps::{check_status, settle};
use crate::domain::config::RunConfig;
use crate::domain::error::ConfigError;
use crate::domain::policy::{FailurePolicy, Step};

/// Proxy settings copied from the host into the image.
pub const HOST_ENVIRONMENT: &str = "/etc/environment";

pub const SETUP_SCRIPT: &str = "setup.sh";
pub const REQUIRED_HELPER: &str = "setup-tdx-common";
pub const OPTIONAL_HELPER: &str = "setup-tdx-config";

/// Staging directory inside the image.
pub const GUEST_STAGING_DIR: &str = "/tmp/tdx/";

/// Where a local package repository lands inside the image.
pub const GUEST_REPO_DIR: &str = "/srv/";

/// Files copied into the image for the setup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSources {
    pub script: PathBuf,
    pub helpers: Vec<PathBuf>,
    pub repo: Option<PathBuf>,
}

impl SetupSources {
    /// Locate `setup.sh` in the tools directory and its helpers two levels
    /// above it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetupFile`] when the script or the
    /// required helper is absent.
    pub fn locate(cfg: &RunConfig, fs: &impl LocalFs) -> Result<Self> {
        let script = cfg.tools_dir().join(SETUP_SCRIPT);
        if !fs.exists(&script) {
            return Err(ConfigError::MissingSetupFile(script).into());
        }

        let helper_dir = cfg
            .tools_dir()
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| cfg.tools_dir());
        let required = helper_dir.join(REQUIRED_HELPER);
        if !fs.exists(&required) {
            return Err(ConfigError::MissingSetupFile(required).into());
        }
        let mut helpers = vec![required];
        let optional = helper_dir.join(OPTIONAL_HELPER);
        if fs.exists(&optional) {
            helpers.push(optional);
        } else {
            tracing::debug!(helper = %optional.display(), "optional helper not present");
        }

        Ok(Self {
            script,
            helpers,
            repo: cfg.package_repo().map(Path::to_path_buf),
        })
    }

    /// Command line run inside the image.
    #[must_use]
    pub fn guest_command(&self) -> String {
        let script = format!("{GUEST_STAGING_DIR}{SETUP_SCRIPT}");
        match self.repo_guest_path() {
            Some(repo) => format!("TDX_LOCAL_REPO={repo} {script}"),
            None => script,
        }
    }

    fn repo_guest_path(&self) -> Option<String> {
        let name = self.repo.as_ref()?.file_name()?;
        Some(format!("{GUEST_REPO_DIR}{}", name.to_string_lossy()))
    }

    /// `virt-customize` arguments after `-a <image>`.
    #[must_use]
    pub fn customize_args(&self) -> Vec<String> {
        let mut args = vec!["--mkdir".to_string(), GUEST_STAGING_DIR.to_string()];
        for file in std::iter::once(&self.script).chain(&self.helpers) {
            args.push("--copy-in".into());
            args.push(format!("{}:{GUEST_STAGING_DIR}", file.display()));
        }
        if let Some(repo) = &self.repo {
            args.push("--copy-in".into());
            args.push(format!("{}:{GUEST_REPO_DIR}", repo.display()));
        }
        args.push("--run-command".into());
        args.push(self.guest_command());
        args
    }
}

/// Copy the host proxy environment into the image, then run the setup
/// script inside it.
///
/// # Errors
///
/// Returns an error if the setup files are missing or the setup script
/// fails.
pub async fn inject_guest_setup(
    cfg: &RunConfig,
    working: &WorkingImage,
    host_env: &Path,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    policy: &FailurePolicy,
) -> Result<()> {
    let sources = SetupSources::locate(cfg, fs)?;
    copy_host_environment(working, host_env, runner, fs, reporter, policy).await?;

    reporter.step("running TDX guest setup inside the image...");
    let image = working.path.to_string_lossy();
    let tail = sources.customize_args();
    let mut args = vec!["-a", &*image];
    args.extend(tail.iter().map(String::as_str));
    tracing::info!(command = %sources.guest_command(), "running guest setup");
    let result = runner
        .run_status("virt-customize", &args)
        .await
        .and_then(|status| check_status(Step::RunGuestSetup, "virt-customize", status));
    if settle(policy, reporter, Step::RunGuestSetup, result)? {
        reporter.success("completed TDX guest setup");
    }
    Ok(())
}

/// Copy `host_env` into the image's `/etc`. Skipped when the host has none.
///
/// # Errors
///
/// Returns an error only if the policy makes this step fatal.
pub async fn copy_host_environment(
    working: &WorkingImage,
    host_env: &Path,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    policy: &FailurePolicy,
) -> Result<()> {
    if !fs.exists(host_env) {
        tracing::debug!(path = %host_env.display(), "no host environment to copy");
        return Ok(());
    }
    let image = working.path.to_string_lossy();
    let copy_in = format!("{}:/etc", host_env.display());
    let result = runner
        .run_status("virt-customize", &["-a", &image, "--copy-in", &copy_in])
        .await
        .and_then(|status| check_status(Step::CopyHostEnvironment, "virt-customize", status));
    if settle(policy, reporter, Step::CopyHostEnvironment, result)? {
        reporter.success("copied host proxy environment into the image");
    }
    Ok(())
}

//! CLI argument parsing with clap derive

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::app::{AppContext, OutputFlags};
use crate::commands;
use crate::domain::config::{
    DEFAULT_BASE_URL, DEFAULT_BOOT_WAIT_MINUTES, DEFAULT_CLOUD_IMAGE, DEFAULT_GUEST_HOSTNAME,
    DEFAULT_GUEST_PASSWORD, DEFAULT_GUEST_USER, DEFAULT_MAX_DOWNLOAD_ATTEMPTS,
    DEFAULT_OUTPUT_IMAGE, DEFAULT_SIZE_GB, GuestIdentity, ImageSource, RunConfig, RunParams,
};
use crate::domain::error::ConfigError;

/// Create a TDX guest image from an Ubuntu cloud image
#[derive(Parser, Debug)]
#[command(name = "create-td-image", version)]
pub struct Cli {
    /// Output guest image file (must end in .qcow2)
    #[arg(short = 'o', long = "output", value_name = "FILE", default_value = DEFAULT_OUTPUT_IMAGE)]
    pub output: PathBuf,

    /// Extra disk space added to the image, in GB
    #[arg(short = 's', long = "size", value_name = "GB", default_value_t = DEFAULT_SIZE_GB)]
    pub size_gb: u32,

    /// Guest hostname
    #[arg(short = 'n', long, env = "GUEST_HOSTNAME", default_value = DEFAULT_GUEST_HOSTNAME)]
    pub hostname: String,

    /// Guest login user
    #[arg(short = 'u', long = "user", env = "GUEST_USER", default_value = DEFAULT_GUEST_USER)]
    pub username: String,

    /// Guest login password
    #[arg(
        short = 'p',
        long,
        env = "GUEST_PASSWORD",
        default_value = DEFAULT_GUEST_PASSWORD,
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Local package repository copied into the guest at /srv/<name>
    #[arg(short = 'r', long = "repo", value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Force recreation of the guest image
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Build from a customized image instead of the official one (not supported)
    #[arg(short = 'c', long = "custom")]
    pub custom: bool,

    /// Directory holding the base image, templates and setup.sh [default: directory of this executable]
    #[arg(long, value_name = "DIR", env = "TDX_TOOLS_DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Minutes to wait for the cloud-init VM to finish
    #[arg(long = "boot-wait", value_name = "MINUTES", default_value_t = DEFAULT_BOOT_WAIT_MINUTES)]
    pub boot_wait: u32,

    /// Maximum downloads of the base image before giving up on its checksum
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DOWNLOAD_ATTEMPTS)]
    pub max_download_attempts: u32,

    /// Directory URL of the official cloud image and its SHA256SUMS
    #[arg(long, hide = true, env = "OFFICIAL_UBUNTU_IMAGE", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// File name of the cloud image
    #[arg(long, hide = true, env = "CLOUD_IMG", default_value = DEFAULT_CLOUD_IMAGE)]
    pub cloud_image: String,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", value_parser = no_color_value)]
    pub no_color: bool,
}

/// `NO_COLOR` convention: any non-empty value disables color. `false` is
/// the flag's implicit default and leaves color on.
fn no_color_value(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(!matches!(value, "" | "false"))
}

impl Cli {
    /// Turn the parsed arguments into a validated `RunConfig`.
    ///
    /// Relative paths are resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid values, or an error if the
    /// current directory or executable location cannot be determined.
    pub fn resolve(&self) -> Result<RunConfig> {
        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        let tools_dir = match &self.tools_dir {
            Some(dir) => absolute(&cwd, dir),
            None => default_tools_dir()?,
        };

        let cfg = RunConfig::new(RunParams {
            output_image: absolute(&cwd, &self.output),
            size_gb: self.size_gb,
            guest: GuestIdentity {
                username: self.username.clone(),
                password: self.password.clone(),
                hostname: self.hostname.clone(),
            },
            package_repo: self.repo.as_deref().map(|r| absolute(&cwd, r)),
            force_recreate: self.force,
            use_custom_image: self.custom,
            source: ImageSource {
                base_url: self.base_url.clone(),
                cloud_image: self.cloud_image.clone(),
            },
            tools_dir,
            boot_wait_minutes: self.boot_wait,
            max_download_attempts: self.max_download_attempts,
        })?;

        if let Some(repo) = cfg.package_repo() {
            if !repo.is_dir() {
                return Err(ConfigError::RepoNotFound(repo.to_path_buf()).into());
            }
        }
        tracing::debug!(config = ?cfg, "resolved configuration");
        Ok(cfg)
    }

    /// Execute the build.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the build fails.
    pub async fn run(self) -> Result<()> {
        let cfg = self.resolve()?;
        let app = AppContext::new(&OutputFlags {
            no_color: self.no_color,
            quiet: self.quiet,
        });
        commands::build::run(&cfg, &app).await
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn default_tools_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable has no parent directory")
}

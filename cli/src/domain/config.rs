//! Run configuration and its pure validators.
//!
//! Pure functions only: no I/O, no async, no filesystem access. The
//! resolver in `crate::cli` performs the filesystem checks and hands the
//! collected values to [`RunConfig::new`].

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::domain::error::ConfigError;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_OUTPUT_IMAGE: &str = "tdx-guest-ubuntu-24.04-generic.qcow2";
pub const DEFAULT_BASE_URL: &str = "https://cloud-images.ubuntu.com/releases/noble/release/";
pub const DEFAULT_CLOUD_IMAGE: &str = "ubuntu-24.04-server-cloudimg-amd64.img";
pub const DEFAULT_SIZE_GB: u32 = 50;
pub const DEFAULT_GUEST_USER: &str = "tdx";
pub const DEFAULT_GUEST_PASSWORD: &str = "123456";
pub const DEFAULT_GUEST_HOSTNAME: &str = "tdx-guest";
pub const DEFAULT_BOOT_WAIT_MINUTES: u32 = 12;
pub const DEFAULT_MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Required extension of the output image.
pub const OUTPUT_SUFFIX: &str = ".qcow2";

/// Name of the checksum manifest, both remotely and in the tools directory.
pub const MANIFEST_FILENAME: &str = "SHA256SUMS";

/// Longest hostname accepted, in bytes (RFC 1123).
pub const MAX_HOSTNAME_LEN: usize = 253;

static HOSTNAME_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid regex")
});

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("valid regex")
});

// ── Types ────────────────────────────────────────────────────────────────────

/// Where the base cloud image and its manifest come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// Directory URL holding `SHA256SUMS` and the image.
    pub base_url: String,
    /// File name of the cloud image, e.g. `ubuntu-24.04-server-cloudimg-amd64.img`.
    pub cloud_image: String,
}

impl ImageSource {
    #[must_use]
    pub fn manifest_url(&self) -> String {
        self.url_for(MANIFEST_FILENAME)
    }

    #[must_use]
    pub fn image_url(&self) -> String {
        self.url_for(&self.cloud_image)
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url.trim_end_matches('/'))
    }
}

/// First-boot identity written into the cloud-init seed.
#[derive(Clone, PartialEq, Eq)]
pub struct GuestIdentity {
    pub username: String,
    pub password: String,
    pub hostname: String,
}

impl std::fmt::Debug for GuestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestIdentity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("hostname", &self.hostname)
            .finish()
    }
}

/// Raw values collected by the resolver, before validation.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Output path, already made absolute against the caller's working directory.
    pub output_image: PathBuf,
    pub size_gb: u32,
    pub guest: GuestIdentity,
    pub package_repo: Option<PathBuf>,
    pub force_recreate: bool,
    pub use_custom_image: bool,
    pub source: ImageSource,
    pub tools_dir: PathBuf,
    pub boot_wait_minutes: u32,
    pub max_download_attempts: u32,
}

/// Immutable configuration for one image build.
///
/// Constructed once by the resolver and passed by reference into every
/// pipeline stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    output_image: PathBuf,
    size_gb: u32,
    guest: GuestIdentity,
    package_repo: Option<PathBuf>,
    force_recreate: bool,
    source: ImageSource,
    tools_dir: PathBuf,
    boot_wait_minutes: u32,
    max_download_attempts: u32,
}

impl RunConfig {
    /// Validate `params` and freeze them into a `RunConfig`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the output name collides with the cloud
    /// image or lacks the `.qcow2` suffix, when `-c` was requested, or when
    /// the size or guest identity is invalid.
    pub fn new(params: RunParams) -> Result<Self> {
        if params.use_custom_image {
            return Err(ConfigError::CustomImageUnsupported(params.source.base_url).into());
        }
        validate_output_name(&params.output_image, &params.source.cloud_image)?;
        if params.size_gb == 0 {
            return Err(ConfigError::InvalidSize(params.size_gb).into());
        }
        validate_hostname(&params.guest.hostname)?;
        validate_username(&params.guest.username)?;

        Ok(Self {
            output_image: params.output_image,
            size_gb: params.size_gb,
            guest: params.guest,
            package_repo: params.package_repo,
            force_recreate: params.force_recreate,
            source: params.source,
            tools_dir: params.tools_dir,
            boot_wait_minutes: params.boot_wait_minutes.max(1),
            max_download_attempts: params.max_download_attempts.max(1),
        })
    }

    #[must_use]
    pub fn output_image(&self) -> &Path {
        &self.output_image
    }

    #[must_use]
    pub fn size_gb(&self) -> u32 {
        self.size_gb
    }

    #[must_use]
    pub fn guest(&self) -> &GuestIdentity {
        &self.guest
    }

    #[must_use]
    pub fn package_repo(&self) -> Option<&Path> {
        self.package_repo.as_deref()
    }

    /// Parsed from `-f`; no stage consults it yet.
    #[must_use]
    pub fn force_recreate(&self) -> bool {
        self.force_recreate
    }

    #[must_use]
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Directory holding the cloud image, manifest, templates and setup script.
    #[must_use]
    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    #[must_use]
    pub fn boot_wait_minutes(&self) -> u32 {
        self.boot_wait_minutes
    }

    #[must_use]
    pub fn max_download_attempts(&self) -> u32 {
        self.max_download_attempts
    }

    /// Local path of the downloaded base image.
    #[must_use]
    pub fn cloud_image_path(&self) -> PathBuf {
        self.tools_dir.join(&self.source.cloud_image)
    }

    /// Local path of the transient checksum manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.tools_dir.join(MANIFEST_FILENAME)
    }
}

/// Well-known transient locations shared by every run on a host.
///
/// Runs are assumed exclusive: two concurrent builds would overwrite each
/// other's working image and seed ISO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPaths {
    /// Mutable copy of the base image being provisioned.
    pub working_image: PathBuf,
    /// NoCloud seed ISO.
    pub seed_iso: PathBuf,
    /// Output of the provisioning VM boot.
    pub boot_log: PathBuf,
}

impl WorkPaths {
    /// Standard file names under `dir` (normally the system temp directory).
    #[must_use]
    pub fn under(dir: &Path) -> Self {
        Self {
            working_image: dir.join("tdx-guest-tmp.qcow2"),
            seed_iso: dir.join("ciiso.iso"),
            boot_log: dir.join("tdx-guest-setup.txt"),
        }
    }
}

/// Sibling of `dest` that receives bytes until the file is complete.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut s = dest.as_os_str().to_owned();
    s.push(".partial");
    PathBuf::from(s)
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Check the output path against the cloud image name and the required suffix.
///
/// # Errors
///
/// Returns [`ConfigError::OutputCollidesWithCloudImage`] or
/// [`ConfigError::OutputSuffix`].
pub fn validate_output_name(output: &Path, cloud_image: &str) -> Result<()> {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name == cloud_image {
        return Err(ConfigError::OutputCollidesWithCloudImage(name).into());
    }
    if !name.ends_with(OUTPUT_SUFFIX) || name.len() == OUTPUT_SUFFIX.len() {
        return Err(ConfigError::OutputSuffix(output.display().to_string()).into());
    }
    Ok(())
}

/// Validate a guest hostname: a short name or a fully qualified domain name
/// made of dot-separated RFC 1123 labels.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidHostname`] when the name is too long or any
/// label is malformed.
pub fn validate_hostname(hostname: &str) -> Result<()> {
    let valid = hostname.len() <= MAX_HOSTNAME_LEN
        && hostname.split('.').all(|label| HOSTNAME_LABEL_RE.is_match(label));
    if !valid {
        return Err(ConfigError::InvalidHostname(hostname.to_string()).into());
    }
    Ok(())
}

/// Validate a guest login name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUsername`] when the name is not a valid
/// Linux login.
pub fn validate_username(username: &str) -> Result<()> {
    if !USERNAME_RE.is_match(username) {
        return Err(ConfigError::InvalidUsername(username.to_string()).into());
    }
    Ok(())
}

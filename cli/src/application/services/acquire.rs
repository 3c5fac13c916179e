//! Image acquisition: checksum manifest download and verified base image.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::{Downloader, FileHasher, LocalFs, ProgressReporter};
use crate::domain::config::{RunConfig, partial_path};
use crate::domain::error::IntegrityError;
use crate::domain::manifest::ChecksumManifest;

/// A local cloud image whose SHA-256 matched the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImage {
    pub path: PathBuf,
    pub sha256: String,
    /// `false` when a previously downloaded file was reused.
    pub downloaded: bool,
}

/// Produce a verified local copy of the configured cloud image.
///
/// The manifest is always fetched fresh: neither a previous manifest nor an
/// interrupted manifest download is reused. The image file is reused when it
/// already verifies; a mismatching file is deleted and downloaded again, up
/// to `max_download_attempts` downloads.
///
/// # Errors
///
/// - [`IntegrityError::MissingEntry`] when the manifest has no line for the
///   image; raised before any image download.
/// - [`IntegrityError::VerificationExhausted`] when every download mismatched.
/// - Transport and filesystem errors, unretried.
pub fn acquire_base_image(
    cfg: &RunConfig,
    downloader: &impl Downloader,
    fs: &(impl LocalFs + FileHasher),
    reporter: &impl ProgressReporter,
) -> Result<BaseImage> {
    let source = cfg.source();
    let name = source.cloud_image.as_str();

    let manifest_path = cfg.manifest_path();
    for stale in [manifest_path.clone(), partial_path(&manifest_path)] {
        if fs.exists(&stale) {
            fs.remove_file(&stale)
                .context("removing stale checksum manifest")?;
        }
    }
    reporter.step(&format!("fetching {}...", source.manifest_url()));
    downloader
        .download(&source.manifest_url(), &manifest_path)
        .context("downloading checksum manifest")?;
    let manifest = ChecksumManifest::parse(&fs.read_to_string(&manifest_path)?);
    let expected = manifest
        .lookup(name)
        .ok_or_else(|| IntegrityError::MissingEntry(name.to_string()))?
        .to_string();
    tracing::debug!(entries = manifest.entries().len(), %expected, "manifest parsed");

    let image = cfg.cloud_image_path();
    let max = cfg.max_download_attempts();
    let mut downloads = 0;
    loop {
        if !fs.exists(&image) {
            if downloads == max {
                return Err(IntegrityError::VerificationExhausted {
                    filename: name.to_string(),
                    attempts: max,
                }
                .into());
            }
            downloads += 1;
            reporter.step(&format!("downloading {name} ({downloads}/{max})..."));
            downloader
                .download(&source.image_url(), &image)
                .with_context(|| format!("downloading {name}"))?;
        }

        let actual = fs.sha256_file(&image)?;
        if actual == expected {
            reporter.success("verified the checksum of the Ubuntu cloud image");
            return Ok(BaseImage {
                path: image,
                sha256: actual,
                downloaded: downloads > 0,
            });
        }

        tracing::warn!(%expected, %actual, "checksum mismatch");
        reporter.warn(&format!("invalid {name} according to sha256sum, re-downloading"));
        fs.remove_file(&image)?;
    }
}

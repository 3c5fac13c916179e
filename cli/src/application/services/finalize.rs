//! Finalizer: transient cleanup and promotion of the finished image.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::{LocalFs, ProgressReporter};
use crate::application::services::materialize::WorkingImage;
use crate::domain::config::RunConfig;

/// Permission bits added to the promoted image (read/write for everyone).
pub const OUTPUT_MODE: u32 = 0o666;

/// Delete the transient checksum manifest if it is still present.
///
/// # Errors
///
/// Returns an error if the manifest exists but cannot be removed.
pub fn remove_manifest(cfg: &RunConfig, fs: &impl LocalFs) -> Result<()> {
    let manifest = cfg.manifest_path();
    if fs.exists(&manifest) {
        fs.remove_file(&manifest)?;
        tracing::debug!(path = %manifest.display(), "removed transient manifest");
    }
    Ok(())
}

/// Move the provisioned image to the output path and make it world
/// read/write. Only called once every provisioning step succeeded.
///
/// # Errors
///
/// Returns an error if the image cannot be moved or its mode changed.
pub fn promote(
    working: &WorkingImage,
    cfg: &RunConfig,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
) -> Result<PathBuf> {
    let output = cfg.output_image().to_path_buf();
    fs.move_file(&working.path, &output)
        .context("failed to move the guest image to the output path")?;
    fs.add_permissions(&output, OUTPUT_MODE)?;
    reporter.success(&format!("TDX guest image: {}", output.display()));
    Ok(output)
}

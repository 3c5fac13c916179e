//! Working image creation: copy the verified base image and grow it.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::ports::{CommandRunner, LocalFs, ProgressReporter};
use crate::application::services::acquire::BaseImage;
use crate::application::services::steps::{check_output, check_status, settle};
use crate::domain::config::{RunConfig, WorkPaths};
use crate::domain::policy::{FailurePolicy, Step};

/// Commands run inside the image to claim the added space. `pollinate`
/// blocks first boot waiting for the network, so it is masked here too.
pub const GROW_COMMANDS: &[&str] = &[
    "growpart /dev/sda 1",
    "resize2fs /dev/sda1",
    "systemctl mask pollinate.service",
];

/// The mutable copy being provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingImage {
    pub path: PathBuf,
    /// `false` when a tolerated resize step failed.
    pub resized: bool,
}

/// Copy `base` to the working path and grow it by the configured size.
///
/// # Errors
///
/// Returns an error when a step whose severity is fatal fails (by default
/// only the copy).
pub async fn materialize(
    cfg: &RunConfig,
    base: &BaseImage,
    paths: &WorkPaths,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    policy: &FailurePolicy,
) -> Result<WorkingImage> {
    let working = paths.working_image.to_string_lossy();

    let copied = fs.copy(&base.path, &paths.working_image).map(|_| ());
    if settle(policy, reporter, Step::CopyBaseImage, copied)? {
        reporter.success(&format!(
            "copied {} => {working}",
            cfg.source().cloud_image
        ));
    }

    let size = format!("+{}G", cfg.size_gb());
    let resize = runner
        .run("qemu-img", &["resize", &working, &size])
        .await
        .and_then(|out| check_output(Step::ResizeImage, "qemu-img", &out));
    let resized = settle(policy, reporter, Step::ResizeImage, resize)?;

    let mut args = vec!["-a", &*working];
    for cmd in GROW_COMMANDS {
        args.extend(["--run-command", *cmd]);
    }
    let grow = runner
        .run_status("virt-customize", &args)
        .await
        .and_then(|status| check_status(Step::GrowFilesystem, "virt-customize", status));
    let grown = settle(policy, reporter, Step::GrowFilesystem, grow)?;

    if resized && grown {
        reporter.success(&format!("resized the guest image by {}G", cfg.size_gb()));
    }

    Ok(WorkingImage {
        path: paths.working_image.clone(),
        resized: resized && grown,
    })
}

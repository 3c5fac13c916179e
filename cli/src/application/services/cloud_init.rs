//! Provisioning configurator: cloud-init seed, seed ISO and the ephemeral
//! VM that lets the guest's own init consume it.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, LocalFs, ProgressReporter};
use crate::application::services::materialize::WorkingImage;
use crate::application::services::steps::{check_output, settle};
use crate::domain::config::{RunConfig, WorkPaths};
use crate::domain::policy::{FailurePolicy, Step};
use crate::domain::seed::{
    CloudInitSeed, DEFAULT_META_DATA_TEMPLATE, DEFAULT_USER_DATA_TEMPLATE, META_DATA,
    SEED_VOLUME_ID, USER_DATA,
};

/// libvirt domain name of the ephemeral provisioning VM.
pub const PROVISIONING_VM: &str = "tdx-config-cloud-init";

/// Seed templates and generated files live here, under the tools directory.
pub const SEED_DIR: &str = "cloud-init-data";

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack on top of `virt-install --wait` before the runner kills it.
const BOOT_TIMEOUT_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Paths of the generated seed files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFiles {
    pub user_data: PathBuf,
    pub meta_data: PathBuf,
}

/// Generate the seed, build its ISO, and boot the working image once so
/// cloud-init applies it. The ephemeral VM is torn down whether or not the
/// boot succeeded.
///
/// # Errors
///
/// Returns an error if the seed cannot be rendered or written, or if a
/// fatal step (ISO build, VM boot) fails.
pub async fn configure_cloud_init(
    cfg: &RunConfig,
    working: &WorkingImage,
    paths: &WorkPaths,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    policy: &FailurePolicy,
) -> Result<CloudInitSeed> {
    teardown_provisioning_vm(runner, reporter, policy).await?;

    let (user_tpl, meta_tpl) = load_templates(cfg.tools_dir(), fs)?;
    let seed = CloudInitSeed::render(&user_tpl, &meta_tpl, cfg.guest())?;
    let files = write_seed(cfg.tools_dir(), &seed, fs)?;
    reporter.success("generated configuration for cloud-init");

    build_seed_iso(&files, paths, runner, fs, reporter, policy).await?;

    reporter.step(&format!(
        "booting {PROVISIONING_VM} to apply cloud-init (up to {} min)...",
        cfg.boot_wait_minutes()
    ));
    let booted = boot_provisioning_vm(cfg, working, paths, runner, fs, reporter, policy).await;
    teardown_provisioning_vm(runner, reporter, policy).await?;
    if booted? {
        reporter.success("completed cloud-init");
    }
    Ok(seed)
}

/// Read the templates from `<tools_dir>/cloud-init-data/`, falling back to
/// the embedded defaults for any that are missing.
///
/// # Errors
///
/// Returns an error if a template exists but cannot be read.
pub fn load_templates(tools_dir: &Path, fs: &impl LocalFs) -> Result<(String, String)> {
    let dir = tools_dir.join(SEED_DIR);
    let read = |name: &str, fallback: &str| -> Result<String> {
        let path = dir.join(format!("{name}.template"));
        if fs.exists(&path) {
            fs.read_to_string(&path)
        } else {
            tracing::debug!(template = %path.display(), "using embedded template");
            Ok(fallback.to_string())
        }
    };
    Ok((
        read(USER_DATA, DEFAULT_USER_DATA_TEMPLATE)?,
        read(META_DATA, DEFAULT_META_DATA_TEMPLATE)?,
    ))
}

/// Write freshly rendered `user-data` and `meta-data` next to the templates.
///
/// # Errors
///
/// Returns an error if the directory or files cannot be written.
pub fn write_seed(tools_dir: &Path, seed: &CloudInitSeed, fs: &impl LocalFs) -> Result<SeedFiles> {
    let dir = tools_dir.join(SEED_DIR);
    fs.create_dir_all(&dir)?;
    let files = SeedFiles {
        user_data: dir.join(USER_DATA),
        meta_data: dir.join(META_DATA),
    };
    fs.write(&files.user_data, &seed.user_data)?;
    fs.write(&files.meta_data, &seed.meta_data)?;
    Ok(files)
}

/// Build the `cidata`-labelled ISO 9660 image holding exactly the two seed
/// files.
///
/// # Errors
///
/// Returns an error if `genisoimage` fails and the step is fatal.
pub async fn build_seed_iso(
    files: &SeedFiles,
    paths: &WorkPaths,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    policy: &FailurePolicy,
) -> Result<()> {
    if fs.exists(&paths.seed_iso) {
        fs.remove_file(&paths.seed_iso)?;
    }
    let iso = paths.seed_iso.to_string_lossy();
    let user_data = files.user_data.to_string_lossy();
    let meta_data = files.meta_data.to_string_lossy();
    let result = runner
        .run(
            "genisoimage",
            &[
                "-output",
                &iso,
                "-volid",
                SEED_VOLUME_ID,
                "-joliet",
                "-rock",
                &user_data,
                &meta_data,
            ],
        )
        .await
        .and_then(|out| check_output(Step::BuildSeedIso, "genisoimage", &out));
    if settle(policy, reporter, Step::BuildSeedIso, result)? {
        reporter.success("generated the cloud-init ISO image");
    }
    Ok(())
}

/// Import the working image as a throwaway VM with the seed ISO attached and
/// wait up to `boot_wait_minutes` for it. Tool output is appended to the
/// boot log.
///
/// Returns whether the boot succeeded.
///
/// # Errors
///
/// Returns an error if `virt-install` fails and the step is fatal.
pub async fn boot_provisioning_vm(
    cfg: &RunConfig,
    working: &WorkingImage,
    paths: &WorkPaths,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    policy: &FailurePolicy,
) -> Result<bool> {
    let disk = working.path.to_string_lossy();
    let cdrom = format!("{},device=cdrom", paths.seed_iso.display());
    let wait = format!("--wait={}", cfg.boot_wait_minutes());
    let timeout = Duration::from_secs(u64::from(cfg.boot_wait_minutes()) * 60) + BOOT_TIMEOUT_MARGIN;
    let log = paths.boot_log.display().to_string();

    let result = runner
        .run_with_timeout(
            "virt-install",
            &[
                "--debug",
                "--memory",
                "4096",
                "--vcpus",
                "4",
                "--name",
                PROVISIONING_VM,
                "--disk",
                &disk,
                "--disk",
                &cdrom,
                "--os-variant",
                "ubuntu24.04",
                "--virt-type",
                "kvm",
                "--graphics",
                "none",
                "--import",
                &wait,
            ],
            timeout,
        )
        .await
        .and_then(|out| {
            for stream in [&out.stdout, &out.stderr] {
                if let Err(e) = fs.append(&paths.boot_log, stream) {
                    tracing::debug!(error = %e, "cannot write boot log");
                }
            }
            check_output(Step::BootProvisioningVm, "virt-install", &out)
        })
        .with_context(|| {
            format!(
                "failed to configure cloud-init; check {log}, or raise --boot-wait above {} and retry",
                cfg.boot_wait_minutes()
            )
        });
    settle(policy, reporter, Step::BootProvisioningVm, result)
}

/// Force-stop and undefine the provisioning VM. "Already gone" and every
/// other failure are handled per the teardown severity (ignored by default).
///
/// # Errors
///
/// Returns an error only if the policy makes teardown fatal.
pub async fn teardown_provisioning_vm(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    policy: &FailurePolicy,
) -> Result<()> {
    for action in ["destroy", "undefine"] {
        let result = runner
            .run_with_timeout("virsh", &[action, PROVISIONING_VM], TEARDOWN_TIMEOUT)
            .await
            .and_then(|out| check_output(Step::TeardownProvisioningVm, "virsh", &out));
        settle(policy, reporter, Step::TeardownProvisioningVm, result)?;
    }
    Ok(())
}

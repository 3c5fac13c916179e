//! Host checks run before any download or tool invocation.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{CommandRunner, ProgressReporter, ToolLocator};
use crate::domain::error::ToolError;

/// External tools the build shells out to, with the Ubuntu package that
/// provides each.
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("qemu-img", "qemu-utils"),
    ("virt-customize", "guestfs-tools"),
    ("virt-install", "virtinst"),
    ("virsh", "libvirt-clients"),
    ("genisoimage", "genisoimage"),
];

/// Pause after the non-root warning so the user can abort.
pub const DEFAULT_PRIVILEGE_DELAY: Duration = Duration::from_secs(5);

/// Fail on the first required tool missing from `PATH`.
///
/// # Errors
///
/// Returns [`ToolError::Missing`] naming the tool and its package.
pub fn check_required_tools(locator: &impl ToolLocator) -> Result<()> {
    for &(tool, package) in REQUIRED_TOOLS {
        match locator.locate(tool) {
            Some(path) => tracing::debug!(tool, path = %path.display(), "found tool"),
            None => return Err(ToolError::Missing { tool, package }.into()),
        }
    }
    Ok(())
}

/// Warn and pause when not running as root. Never fails the run.
///
/// Returns `true` when running as root.
pub async fn check_privileges(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    delay: Duration,
) -> bool {
    let uid = match runner.run("id", &["-u"]).await {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_owned(),
        Ok(out) => {
            tracing::debug!(status = %out.status, "id -u failed");
            String::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "cannot determine user id");
            String::new()
        }
    };
    if uid == "0" {
        return true;
    }
    reporter.warn("this script requires root privileges and may fail; it is recommended to run as root");
    tokio::time::sleep(delay).await;
    false
}

//! Per-step failure severity.
//!
//! The build deliberately treats some tool failures as warnings (a guest
//! that was not resized still boots). That choice lives here as data so the
//! pipeline never decides it ad hoc.

use std::fmt;

/// How a failed step affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the run.
    Fatal,
    /// Report and continue.
    Warn,
    /// Continue silently (logged at debug).
    Ignore,
}

/// Steps whose failure handling is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CopyBaseImage,
    ResizeImage,
    GrowFilesystem,
    BuildSeedIso,
    BootProvisioningVm,
    TeardownProvisioningVm,
    CopyHostEnvironment,
    RunGuestSetup,
}

impl Step {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CopyBaseImage => "copy base image",
            Self::ResizeImage => "resize disk image",
            Self::GrowFilesystem => "grow guest filesystem",
            Self::BuildSeedIso => "build cloud-init ISO",
            Self::BootProvisioningVm => "boot provisioning VM",
            Self::TeardownProvisioningVm => "tear down provisioning VM",
            Self::CopyHostEnvironment => "copy host environment",
            Self::RunGuestSetup => "run guest setup",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity assigned to each [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    pub copy_base_image: Severity,
    pub resize_image: Severity,
    pub grow_filesystem: Severity,
    pub build_seed_iso: Severity,
    pub boot_provisioning_vm: Severity,
    pub teardown_provisioning_vm: Severity,
    pub copy_host_environment: Severity,
    pub run_guest_setup: Severity,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            copy_base_image: Severity::Fatal,
            resize_image: Severity::Warn,
            grow_filesystem: Severity::Warn,
            build_seed_iso: Severity::Fatal,
            boot_provisioning_vm: Severity::Fatal,
            teardown_provisioning_vm: Severity::Ignore,
            copy_host_environment: Severity::Warn,
            run_guest_setup: Severity::Fatal,
        }
    }
}

impl FailurePolicy {
    #[must_use]
    pub fn severity(&self, step: Step) -> Severity {
        match step {
            Step::CopyBaseImage => self.copy_base_image,
            Step::ResizeImage => self.resize_image,
            Step::GrowFilesystem => self.grow_filesystem,
            Step::BuildSeedIso => self.build_seed_iso,
            Step::BootProvisioningVm => self.boot_provisioning_vm,
            Step::TeardownProvisioningVm => self.teardown_provisioning_vm,
            Step::CopyHostEnvironment => self.copy_host_environment,
            Step::RunGuestSetup => self.run_guest_setup,
        }
    }
}

//! Exit-status checking and severity handling shared by the build stages.

use std::process::{ExitStatus, Output};

use anyhow::Result;

use crate::application::ports::ProgressReporter;
use crate::domain::error::ToolError;
use crate::domain::policy::{FailurePolicy, Severity, Step};

/// Turn a captured tool run into `Ok(())` or a [`ToolError::Failed`].
///
/// # Errors
///
/// Returns an error when the tool exited non-zero.
pub fn check_output(step: Step, program: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(ToolError::failed(step.label(), program, &output.status.to_string(), &output.stderr).into())
}

/// Turn an inherited-stdio tool run into `Ok(())` or a [`ToolError::Failed`].
///
/// # Errors
///
/// Returns an error when the tool exited non-zero.
pub fn check_status(step: Step, program: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    Err(ToolError::failed(step.label(), program, &status.to_string(), &[]).into())
}

/// Apply `policy` to the result of `step`.
///
/// Returns `Ok(true)` when the step succeeded, `Ok(false)` when it failed but
/// the policy tolerates it, and the original error when it is fatal.
///
/// # Errors
///
/// Returns the step's error when its severity is [`Severity::Fatal`].
pub fn settle(
    policy: &FailurePolicy,
    reporter: &impl ProgressReporter,
    step: Step,
    result: Result<()>,
) -> Result<bool> {
    let Err(err) = result else {
        return Ok(true);
    };
    match policy.severity(step) {
        Severity::Fatal => Err(err.context(format!("failed to {step}"))),
        Severity::Warn => {
            tracing::warn!(step = %step, error = %format!("{err:#}"), "tolerated failure");
            reporter.warn(&format!("failed to {step}: {err:#}"));
            Ok(false)
        }
        Severity::Ignore => {
            tracing::debug!(step = %step, error = %format!("{err:#}"), "ignored failure");
            Ok(false)
        }
    }
}

//! `create-td-image`: build a TDX guest image.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::build::{self as service, BuildOptions, BuildOutcome};
use crate::domain::config::RunConfig;
use crate::output::{Mark, OutputContext};

/// Run the build with the production adapters in `app`.
///
/// # Errors
///
/// Returns an error if a required tool is missing or any fatal build step
/// fails.
pub async fn run(cfg: &RunConfig, app: &AppContext) -> Result<()> {
    let reporter = app.terminal_reporter();
    print_plan(cfg, &app.output);

    let outcome = service::build_image(
        cfg,
        &app.runner,
        &app.downloader,
        &app.fs,
        &app.locator,
        &reporter,
        BuildOptions {
            paths: &app.paths,
            policy: &app.policy,
            host_env: &app.host_env,
            privilege_delay: app.privilege_delay,
        },
    )
    .await?;

    print_summary(&outcome, &app.output);
    Ok(())
}

fn print_plan(cfg: &RunConfig, ctx: &OutputContext) {
    let mut rows = vec![
        ("Base image", cfg.source().image_url()),
        ("Output", cfg.output_image().display().to_string()),
        ("Size", format!("+{}G", cfg.size_gb())),
        ("Hostname", cfg.guest().hostname.clone()),
        ("User", cfg.guest().username.clone()),
    ];
    if let Some(repo) = cfg.package_repo() {
        rows.push(("Local repo", repo.display().to_string()));
    }
    ctx.table("Creating TDX guest image", &rows);
    if cfg.force_recreate() {
        ctx.emit(Mark::Note, "-f has no effect: the image is always rebuilt");
    }
}

fn print_summary(outcome: &BuildOutcome, ctx: &OutputContext) {
    if !outcome.resized {
        ctx.emit(
            Mark::Warn,
            "the image was not resized; the guest filesystem keeps its original size",
        );
    }
    let base = if outcome.base_downloaded {
        "downloaded"
    } else {
        "reused from disk"
    };
    ctx.table(
        "TDX guest image ready",
        &[
            ("Image", outcome.output.display().to_string()),
            ("Base image", base.to_string()),
            ("Base sha256", outcome.base_sha256.clone()),
        ],
    );
}

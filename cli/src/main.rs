//! create-td-image - build a TDX guest image from an Ubuntu cloud image

use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use tdx_guest_image::cli::Cli;
use tdx_guest_image::output::{Mark, OutputContext};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // Usage errors exit 1, not clap's default 2.
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let ctx = OutputContext::new(cli.no_color, cli.quiet);
    if let Err(e) = cli.run().await {
        ctx.emit(Mark::Fail, &format!("{e:#}"));
        std::process::exit(1);
    }
}

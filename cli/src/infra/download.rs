//! HTTP download infrastructure: implements the `Downloader` port.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::ports::Downloader;
use crate::domain::config::partial_path;

/// Streams a URL to disk through `<dest>.partial`, resuming an interrupted
/// transfer with an HTTP `Range` request.
pub struct UreqDownloader {
    show_progress: bool,
}

impl UreqDownloader {
    #[must_use]
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }
}

impl Downloader for UreqDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::info!(url, dest = %dest.display(), "downloading");
        let partial = partial_path(dest);
        let existing = partial.metadata().map(|m| m.len()).unwrap_or(0);
        do_download(url, dest, &partial, existing, self.show_progress, true)
    }
}

fn do_download(
    url: &str,
    dest: &Path,
    partial: &Path,
    existing: u64,
    show_progress: bool,
    allow_retry: bool,
) -> Result<()> {
    let req = ureq::get(url).set("User-Agent", concat!("tdx-guest-image/", env!("CARGO_PKG_VERSION")));
    let req = if existing > 0 {
        req.set("Range", &format!("bytes={existing}-"))
    } else {
        req
    };

    let response = match req.call() {
        Ok(r) => r,
        Err(ureq::Error::Status(416, _)) if allow_retry => {
            std::fs::remove_file(partial).ok();
            return do_download(url, dest, partial, 0, show_progress, false);
        }
        Err(ureq::Error::Status(code, _)) => anyhow::bail!("Download of {url} failed: HTTP {code}"),
        Err(e) => return Err(e).with_context(|| format!("Download of {url} interrupted")),
    };

    let status = response.status();
    let (mut file, start_pos) = open_partial_file(status, partial, existing)?;

    let total = response
        .header("Content-Length")
        .and_then(|v| v.parse::<u64>().ok())
        .map(|len| if status == 206 { start_pos + len } else { len });

    if start_pos > 0 && total.is_some_and(|t| start_pos >= t) {
        drop(file);
        std::fs::remove_file(partial).ok();
        return do_download(url, dest, partial, 0, show_progress, false);
    }

    let pb = make_progress_bar(show_progress, url, total, start_pos);

    let mut reader = response.into_reader();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).context("Download interrupted")?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).context("Download interrupted")?;
        pb.inc(n as u64);
    }
    pb.finish_and_clear();
    drop(file);
    std::fs::rename(partial, dest)
        .with_context(|| format!("failed to finalize download {}", dest.display()))?;
    Ok(())
}

fn open_partial_file(status: u16, partial: &Path, existing: u64) -> Result<(File, u64)> {
    if status == 206 {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(partial)
            .context("opening partial file")?;
        Ok((file, existing))
    } else if status == 200 {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(partial)
            .context("opening partial file")?;
        Ok((file, 0))
    } else {
        anyhow::bail!("Download failed: HTTP {status}");
    }
}

fn make_progress_bar(show: bool, url: &str, total: Option<u64>, start_pos: u64) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let name = url.rsplit('/').next().unwrap_or(url).to_string();
    let pb = if let Some(t) = total {
        let pb = ProgressBar::new(t);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("    {msg}\n    {bar:40.cyan/dim} {percent}%  {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━━─"),
        );
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("    {spinner:.cyan} {msg}  {bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    };
    pb.set_message(name);
    pb.set_position(start_pos);
    pb
}

//! Shared mock infrastructure for unit tests.
//!
//! `mockall` mocks for the synchronous ports, plus a recording
//! `CommandRunner` (async trait methods are implemented by hand).

#![allow(clippy::expect_used, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use mockall::mock;
use sha2::{Digest, Sha256};

use tdx_guest_image::application::ports::{
    CommandRunner, Downloader, ProgressReporter, ToolLocator,
};
use tdx_guest_image::domain::config::{GuestIdentity, ImageSource, RunConfig, RunParams};

mock! {
    pub Http {}
    impl Downloader for Http {
        fn download(&self, url: &str, dest: &Path) -> Result<()>;
    }
}

mock! {
    pub Locator {}
    impl ToolLocator for Locator {
        fn locate(&self, tool: &str) -> Option<PathBuf>;
    }
}

// ── Cross-platform ExitStatus construction ───────────────────────────────────

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Runner ───────────────────────────────────────────────────────────────────

/// Records every invocation; fails with `code` when `program` is called with
/// an argument containing `needle`.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    fail_on: Option<(String, String, i32)>,
}

impl RecordingRunner {
    pub fn failing(program: &str, needle: &str, code: i32) -> Self {
        Self {
            fail_on: Some((program.into(), needle.into(), code)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, program: &str, args: &[&str]) -> i32 {
        self.calls.lock().expect("lock").push((
            program.to_owned(),
            args.iter().map(ToString::to_string).collect(),
        ));
        match &self.fail_on {
            Some((p, needle, code)) if p == program && args.iter().any(|a| a.contains(needle.as_str())) => *code,
            _ => 0,
        }
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, Duration::from_secs(1)).await
    }

    async fn run_with_timeout(&self, program: &str, args: &[&str], _: Duration) -> Result<Output> {
        let code = self.record(program, args);
        Ok(Output {
            status: exit_status(code),
            stdout: Vec::new(),
            stderr: if code == 0 { Vec::new() } else { b"boom".to_vec() },
        })
    }

    async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
        Ok(exit_status(self.record(program, args)))
    }
}

// ── Reporter ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CollectingReporter {
    pub messages: Mutex<Vec<String>>,
}

impl ProgressReporter for CollectingReporter {
    fn step(&self, message: &str) {
        self.messages.lock().expect("lock").push(format!("→ {message}"));
    }
    fn success(&self, message: &str) {
        self.messages.lock().expect("lock").push(format!("✓ {message}"));
    }
    fn warn(&self, message: &str) {
        self.messages.lock().expect("lock").push(format!("⚠ {message}"));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub const CLOUD_IMAGE: &str = "ubuntu-24.04-server-cloudimg-amd64.img";
pub const BASE_URL: &str = "https://cloud-images.example/noble/release/";

/// A checkout-like layout under `root`: `guest-tools/image` holds `setup.sh`,
/// `root` holds `setup-tdx-common`, and `work` is the caller's directory.
pub fn layout(root: &Path) -> (PathBuf, PathBuf) {
    let tools = root.join("guest-tools").join("image");
    let work = root.join("work");
    std::fs::create_dir_all(&tools).expect("tools");
    std::fs::create_dir_all(&work).expect("work");
    std::fs::write(tools.join("setup.sh"), "#!/bin/sh\n").expect("setup.sh");
    std::fs::write(root.join("setup-tdx-common"), "#!/bin/sh\n").expect("common");
    (tools, work)
}

pub fn config(tools: &Path, work: &Path) -> RunConfig {
    RunConfig::new(RunParams {
        output_image: work.join("out.qcow2"),
        size_gb: 50,
        guest: GuestIdentity {
            username: "alice".into(),
            password: "secret".into(),
            hostname: "myhost".into(),
        },
        package_repo: None,
        force_recreate: false,
        use_custom_image: false,
        source: ImageSource {
            base_url: BASE_URL.into(),
            cloud_image: CLOUD_IMAGE.into(),
        },
        tools_dir: tools.to_path_buf(),
        boot_wait_minutes: 12,
        max_download_attempts: 3,
    })
    .expect("valid config")
}

/// A locator that finds every tool under `/usr/bin`.
pub fn all_tools() -> MockLocator {
    let mut locator = MockLocator::new();
    locator
        .expect_locate()
        .returning(|tool| Some(Path::new("/usr/bin").join(tool)));
    locator
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// A downloader serving a manifest that lists `image` and the image itself.
pub fn serving(image: &'static [u8]) -> MockHttp {
    let manifest = format!("{}  {CLOUD_IMAGE}\n", sha256_hex(image));
    let mut downloader = MockHttp::new();
    downloader.expect_download().returning(move |url, dest| {
        let body = if url.ends_with("/SHA256SUMS") {
            manifest.clone().into_bytes()
        } else {
            image.to_vec()
        };
        std::fs::write(dest, body)?;
        Ok(())
    });
    downloader
}

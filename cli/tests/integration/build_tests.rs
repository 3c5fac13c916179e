//! Full runs of the binary against a local HTTP server and stand-in tools.

#![allow(clippy::expect_used)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CLOUD_IMAGE: &str = "ubuntu-24.04-server-cloudimg-amd64.img";
const IMAGE: &[u8] = b"pretend this is an ubuntu cloud image";

/// Serve `routes` over HTTP/1.1 on an ephemeral port until the test exits.
/// `Range: bytes=N-` requests get a 206 with the tail of the body.
fn serve(routes: Vec<(String, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let request = String::from_utf8_lossy(&request);
            let path = request.split_whitespace().nth(1).unwrap_or("/");
            let offset = request
                .lines()
                .find_map(|line| line.strip_prefix("Range: bytes="))
                .and_then(|range| range.trim_end_matches('-').parse::<usize>().ok());
            let response = match routes.iter().find(|(route, _)| route == path) {
                Some((_, body)) => {
                    let (status, tail) = match offset {
                        Some(n) if n < body.len() => ("206 Partial Content", &body[n..]),
                        _ => ("200 OK", &body[..]),
                    };
                    let mut r = format!(
                        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        tail.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(tail);
                    r
                }
                None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    .to_vec(),
            };
            stream.write_all(&response).ok();
        }
    });
    format!("http://{addr}/")
}

fn manifest() -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CLOUD_IMAGE);
    std::fs::write(&path, IMAGE).expect("write");
    let hash = tdx_guest_image::infra::fs::sha256_file(&path).expect("hash");
    format!("{} *ubuntu-24.04-server-cloudimg-arm64.img\n{hash} *{CLOUD_IMAGE}\n", "1".repeat(64))
}

fn script(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
}

/// A host with every required tool; `virt-customize` exits `setup_status`
/// when asked to run the guest setup script.
struct FakeHost {
    _root: TempDir,
    bin: PathBuf,
    tools: PathBuf,
    tmp: PathBuf,
    work: PathBuf,
}

impl FakeHost {
    fn new(setup_status: u8) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let bin = root.path().join("bin");
        let tools = root.path().join("guest-tools").join("image");
        let tmp = root.path().join("tmp");
        let work = root.path().join("work");
        for dir in [&bin, &tools, &tmp, &work] {
            std::fs::create_dir_all(dir).expect("mkdir");
        }
        std::fs::write(tools.join("setup.sh"), "#!/bin/sh\n").expect("setup.sh");
        std::fs::write(root.path().join("setup-tdx-common"), "#!/bin/sh\n").expect("common");

        for tool in ["qemu-img", "virt-install", "virsh", "genisoimage"] {
            script(&bin, tool, "exit 0");
        }
        script(&bin, "id", "echo 0");
        script(
            &bin,
            "virt-customize",
            &format!("case \"$*\" in *setup.sh*) exit {setup_status};; esac\nexit 0"),
        );

        Self {
            _root: root,
            bin,
            tools,
            tmp,
            work,
        }
    }

    fn command(&self, base_url: &str) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("create-td-image"));
        cmd.current_dir(&self.work)
            .env("PATH", &self.bin)
            .env("TMPDIR", &self.tmp)
            .env("NO_COLOR", "1")
            .env("TDX_TOOLS_DIR", &self.tools)
            .env("OFFICIAL_UBUNTU_IMAGE", base_url)
            .env_remove("CLOUD_IMG")
            .env_remove("GUEST_USER")
            .env_remove("GUEST_PASSWORD")
            .env_remove("GUEST_HOSTNAME")
            .args(["-o", "guest.qcow2", "-q"]);
        cmd
    }

    fn output(&self) -> PathBuf {
        self.work.join("guest.qcow2")
    }

    fn manifest(&self) -> PathBuf {
        self.tools.join("SHA256SUMS")
    }
}

fn routes() -> Vec<(String, Vec<u8>)> {
    vec![
        ("/SHA256SUMS".to_string(), manifest().into_bytes()),
        (format!("/{CLOUD_IMAGE}"), IMAGE.to_vec()),
    ]
}

#[test]
fn test_successful_build_writes_world_writable_output() {
    use std::os::unix::fs::PermissionsExt;
    let host = FakeHost::new(0);
    let base_url = serve(routes());

    host.command(&base_url)
        .args(["-n", "tdx-guest.example.com"])
        .assert()
        .success();

    assert_eq!(std::fs::read(host.output()).expect("output"), IMAGE);
    let mode = std::fs::metadata(host.output()).expect("meta").permissions().mode();
    assert_eq!(mode & 0o666, 0o666);
    assert!(!host.manifest().exists());
    let meta_data = std::fs::read_to_string(host.tools.join("cloud-init-data/meta-data"))
        .expect("meta-data");
    assert!(meta_data.contains("local-hostname: tdx-guest.example.com"));
}

#[test]
fn test_guest_setup_failure_exits_one_without_output() {
    let host = FakeHost::new(3);
    let base_url = serve(routes());

    host.command(&base_url)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("run guest setup"));

    assert!(!host.output().exists());
    assert!(!host.manifest().exists());
    assert!(host.tmp.join("tdx-guest-tmp.qcow2").exists());
}

#[test]
fn test_stale_manifest_partial_is_not_resumed() {
    let host = FakeHost::new(0);
    let base_url = serve(routes());
    // Same length as the current first line, so a resumed fetch would list
    // this stale checksum first.
    let older = format!("{} *{CLOUD_IMAGE}\n", "f".repeat(64));
    std::fs::write(host.tools.join("SHA256SUMS.partial"), &older).expect("partial");

    host.command(&base_url).assert().success();

    assert_eq!(std::fs::read(host.output()).expect("output"), IMAGE);
    assert!(!host.tools.join("SHA256SUMS.partial").exists());
}

//! End-to-end runs of the `wheelpick` binary against mock package indexes.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CFFI_FILES: &[&str] = &[
    "cffi-1.15.1-cp27-cp27m-macosx_10_9_x86_64.whl",
    "cffi-1.15.1-cp27-cp27m-manylinux1_i686.whl",
    "cffi-1.15.1-cp27-cp27m-win32.whl",
    "cffi-1.15.1-cp27-cp27m-win_amd64.whl",
    "cffi-1.15.1-cp27-cp27mu-manylinux1_i686.whl",
    "cffi-1.15.1-cp310-cp310-macosx_10_9_x86_64.whl",
    "cffi-1.15.1-cp310-cp310-macosx_11_0_arm64.whl",
    "cffi-1.15.1-cp310-cp310-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
    "cffi-1.15.1-cp310-cp310-musllinux_1_1_x86_64.whl",
    "cffi-1.15.1-cp310-cp310-win_amd64.whl",
    "cffi-1.15.1-cp311-cp311-macosx_11_0_arm64.whl",
    "cffi-1.15.1-cp311-cp311-manylinux_2_17_ppc64le.manylinux2014_ppc64le.whl",
    "cffi-1.15.1-cp311-cp311-musllinux_1_1_x86_64.whl",
    "cffi-1.15.1-cp311-cp311-win_amd64.whl",
    "cffi-1.15.1-cp39-cp39-macosx_11_0_arm64.whl",
    "cffi-1.15.1-cp39-cp39-win_amd64.whl",
    "cffi-1.15.1.tar.gz",
];

/// Test context with an isolated HOME, Poetry config directory and project.
struct TestContext {
    temp_dir: TempDir,
    project: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let project = temp_dir.path().join("project");
        std::fs::create_dir_all(&project).expect("failed to create project dir");
        Self { temp_dir, project }
    }

    fn write_lockfile(&self, name: &str, content: &str) {
        std::fs::write(self.project.join(name), content).expect("failed to write lockfile");
    }

    fn wheelpick(&self, index_url: &str) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_wheelpick"));
        cmd.current_dir(&self.project);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("POETRY_CONFIG_DIR", self.temp_dir.path().join("pypoetry"));
        cmd.env("WHEELPICK_INDEX_URL", index_url);
        cmd.env("NO_PROXY", "127.0.0.1,localhost");
        cmd.env_remove("RUST_LOG");
        cmd.arg("--no-color");
        cmd
    }

    fn target(&self) -> PathBuf {
        self.project.join("wheels")
    }
}

fn digest_of(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn fake_digest(n: usize) -> String {
    format!("{n:064x}")
}

fn cffi_lockfile() -> String {
    let files: Vec<String> = CFFI_FILES
        .iter()
        .enumerate()
        .map(|(n, f)| format!("    {{file = \"{f}\", hash = \"sha256:{}\"}},", fake_digest(n)))
        .collect();
    format!(
        r#"[[package]]
name = "cffi"
version = "1.15.1"
description = "Foreign Function Interface for Python calling C code."
optional = false
python-versions = "*"
files = [
{}
]

[metadata]
lock-version = "2.0"
python-versions = "^3.7"
content-hash = "0000"
"#,
        files.join("\n")
    )
}

fn cffi_release(server_url: &str) -> String {
    let urls: Vec<String> = CFFI_FILES
        .iter()
        .enumerate()
        .map(|(n, f)| {
            format!(
                r#"{{"filename": "{f}", "url": "{server_url}/files/{f}", "digests": {{"sha256": "{}"}}}}"#,
                fake_digest(n)
            )
        })
        .collect();
    format!(r#"{{"info": {{"name": "cffi"}}, "urls": [{}]}}"#, urls.join(","))
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run wheelpick")
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = run(ctx.wheelpick("http://127.0.0.1:9").arg("--help"));
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--python-version"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = run(ctx.wheelpick("http://127.0.0.1:9").arg("--version"));
    assert!(output.status.success());
    assert!(stdout_of(&output).starts_with("wheelpick"));
}

#[test]
fn test_missing_lockfile_fails() {
    let ctx = TestContext::new();
    let output = run(ctx
        .wheelpick("http://127.0.0.1:9")
        .args(["-p", "3.11", "--platform", "win_amd64", "--dryrun"]));
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("✘"));
    assert!(stderr.contains("No supported source file"));
}

#[test]
fn test_dry_run_platform_table() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/pypi/cffi/1.15.1/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(cffi_release(&server.url()))
        .create();

    let ctx = TestContext::new();
    ctx.write_lockfile("poetry.lock", &cffi_lockfile());

    let cases = [
        ("2.7", "win_amd64", "cffi-1.15.1-cp27-cp27m-win_amd64.whl"),
        ("3.11", "win_amd64", "cffi-1.15.1-cp311-cp311-win_amd64.whl"),
        ("3.9", "macosx_11_0_arm64", "cffi-1.15.1-cp39-cp39-macosx_11_0_arm64.whl"),
        ("3.10", "macosx_10_9_x86_64", "cffi-1.15.1-cp310-cp310-macosx_10_9_x86_64.whl"),
        ("2.7", "manylinux1_i686", "cffi-1.15.1-cp27-cp27mu-manylinux1_i686.whl"),
        (
            "3.11",
            "manylinux2014_ppc64le",
            "cffi-1.15.1-cp311-cp311-manylinux_2_17_ppc64le.manylinux2014_ppc64le.whl",
        ),
        ("3.10", "musllinux_1_1_x86_64", "cffi-1.15.1-cp310-cp310-musllinux_1_1_x86_64.whl"),
    ];

    for (version, platform, expected) in cases {
        let output = run(ctx.wheelpick(&server.url()).args([
            "-p",
            version,
            "--platform",
            platform,
            "--python-implementation",
            "cp",
            "--dryrun",
        ]));
        assert!(output.status.success(), "{}", stderr_of(&output));
        let stdout = stdout_of(&output);
        assert!(stdout.starts_with("📦 cffi"), "{stdout}");
        assert!(stdout.trim_end().ends_with(expected), "python {version} on {platform}: {stdout}");
    }
    assert!(!ctx.target().exists());
}

#[test]
fn test_download_into_target() {
    let body = b"six wheel bytes";
    let wheel = "six-1.16.0-py2.py3-none-any.whl";
    let digest = digest_of(body);

    let mut server = mockito::Server::new();
    let release = format!(
        r#"{{"urls": [{{"filename": "{wheel}", "url": "{}/files/{wheel}", "digests": {{"sha256": "{digest}"}}}}]}}"#,
        server.url()
    );
    let _metadata = server
        .mock("GET", "/pypi/six/1.16.0/json")
        .with_status(200)
        .with_body(release)
        .create();
    let download = server
        .mock("GET", format!("/files/{wheel}").as_str())
        .with_status(200)
        .with_body(body)
        .create();

    let ctx = TestContext::new();
    ctx.write_lockfile(
        "pdm.lock",
        &format!(
            r#"[metadata]
groups = ["default"]

[[package]]
name = "six"
version = "1.16.0"
requires_python = ">=2.7, !=3.0.*, !=3.1.*, !=3.2.*"
groups = ["default"]
files = [
    {{file = "{wheel}", hash = "sha256:{digest}"}},
]
"#
        ),
    );

    let output = run(ctx
        .wheelpick(&server.url())
        .args(["-p", "3.11", "--platform", "manylinux_2_31_x86_64"]));
    assert!(output.status.success(), "{}", stderr_of(&output));
    download.assert();

    let saved = ctx.target().join(wheel);
    assert_eq!(std::fs::read(&saved).unwrap(), body);
    assert!(!Path::new(&format!("{}.part", saved.display())).exists());
    assert!(stdout_of(&output).trim_end().ends_with(wheel));
}

#[test]
fn test_unlocated_package_stops_only_a_real_run() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/pypi/cffi/1.15.1/json")
        .with_status(200)
        .with_body(r#"{"urls": []}"#)
        .create();

    let ctx = TestContext::new();
    ctx.write_lockfile("poetry.lock", &cffi_lockfile());

    let args = ["-p", "3.11", "--platform", "win_amd64"];
    let output = run(ctx.wheelpick(&server.url()).args(args).arg("--dryrun"));
    assert!(output.status.success(), "{}", stderr_of(&output));
    let stdout = stdout_of(&output);
    let mut lines = stdout.lines();
    assert!(lines.next().unwrap().starts_with("✘ cffi"));
    assert!(lines.next().unwrap().starts_with("\tThe source lock file does not contain"));

    let output = run(ctx.wheelpick(&server.url()).args(args));
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("✘ The source lock file does not contain a correct reference for package cffi"));

    let output = run(ctx.wheelpick(&server.url()).args(args).arg("--ignore-missing"));
    assert!(output.status.success(), "{}", stderr_of(&output));
    let stdout = stdout_of(&output);
    let mut lines = stdout.lines();
    assert!(lines.next().unwrap().starts_with("✘ cffi"));
    assert!(lines.next().unwrap().starts_with("\tThe source lock file does not contain"));
    assert_eq!(std::fs::read_dir(ctx.target()).unwrap().count(), 0);
}

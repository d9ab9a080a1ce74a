use assert_cmd::Command;
use mockito::Server;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::path::Path;

use tvm::platform::Platform;

fn create_zip(files: &[(&str, &str)]) -> Vec<u8> {
    use zip::CompressionMethod;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// The artifact key for the platform the test binary runs on.
fn release_key() -> String {
    Platform::detect()
        .release_key()
        .expect("tests must run on a supported platform")
}

fn tvm(root: &Path, releases_url: &str) -> Command {
    let mut cmd = Command::cargo_bin("tvm").unwrap();
    cmd.arg("--root")
        .arg(root)
        .arg("--releases-url")
        .arg(releases_url);
    cmd
}

/// Mock a complete release for `version`: the SHA256SUMS file and the zip
/// artifact for the current platform.
fn mock_release(server: &mut Server, version: &str, zip: &[u8]) -> (mockito::Mock, mockito::Mock) {
    let key = release_key();
    let artifact = format!("terraform_{}_{}.zip", version, key);
    let sums = format!("{}  {}\n", sha256_hex(zip), artifact);

    let sums_mock = server
        .mock(
            "GET",
            format!("/{}/terraform_{}_SHA256SUMS", version, version).as_str(),
        )
        .with_status(200)
        .with_body(sums)
        .create();
    let artifact_mock = server
        .mock("GET", format!("/{}/{}", version, artifact).as_str())
        .with_status(200)
        .with_body(zip.to_vec())
        .create();
    (sums_mock, artifact_mock)
}

#[test]
fn test_end_to_end_install_use_list_remove() {
    let mut server = Server::new();
    let url = server.url();
    let store = tempfile::tempdir().unwrap();

    let zip = create_zip(&[("terraform", "fake terraform binary")]);
    let _mocks: Vec<_> = ["1.5.2", "1.6.4"]
        .iter()
        .map(|version| mock_release(&mut server, version, &zip))
        .collect();

    tvm(store.path(), &url)
        .args(["install", "1.5.2", "1.6.4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed terraform 1.5.2"))
        .stdout(predicate::str::contains("Installed terraform 1.6.4"));

    assert!(store.path().join("1.5.2").join("terraform").exists());
    assert!(store.path().join("1.6.4").join("terraform").exists());

    tvm(store.path(), &url)
        .args(["use", "1.6.4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("terraform 1.6.4 is now active"));

    let active = store.path().join("active");
    assert!(active.symlink_metadata().unwrap().file_type().is_symlink());
    assert_eq!(
        std::fs::read_link(&active).unwrap(),
        Path::new("1.6.4").join("terraform")
    );
    assert_eq!(
        std::fs::canonicalize(&active).unwrap(),
        std::fs::canonicalize(store.path().join("1.6.4").join("terraform")).unwrap()
    );

    tvm(store.path(), &url)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"\*\s+1\.6\.4").unwrap());

    // remove unused keeps the active version
    tvm(store.path(), &url)
        .args(["remove", "unused"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed terraform 1.5.2"));
    assert!(!store.path().join("1.5.2").exists());
    assert!(store.path().join("1.6.4").exists());

    // remove all refuses while a version is active
    tvm(store.path(), &url)
        .args(["remove", "all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("active"));
    assert!(store.path().join("1.6.4").exists());

    // forced remove all empties the store and the link
    tvm(store.path(), &url)
        .args(["remove", "all", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed terraform 1.6.4"));
    assert!(!store.path().join("1.6.4").exists());
    assert!(!active.exists());
    assert!(active.symlink_metadata().is_err());
}

#[test]
fn test_use_with_relative_root_leaves_a_working_link() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let exe = store.join("1.6.4").join("terraform");
    std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
    std::fs::write(&exe, b"fake terraform binary").unwrap();

    // Pass the root as a path relative to the process working directory
    Command::cargo_bin("tvm")
        .unwrap()
        .current_dir(dir.path())
        .args(["--root", "store", "use", "1.6.4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("terraform 1.6.4 is now active"));

    // The link must resolve from anywhere on the filesystem
    let active = store.join("active");
    assert_eq!(
        std::fs::canonicalize(&active).unwrap(),
        std::fs::canonicalize(&exe).unwrap()
    );
}

#[test]
fn test_install_is_idempotent_without_network() {
    let mut server = Server::new();
    let url = server.url();
    let store = tempfile::tempdir().unwrap();

    let zip = create_zip(&[("terraform", "fake terraform binary")]);
    let key = release_key();
    let artifact = format!("terraform_1.6.4_{}.zip", key);

    // Each mock tolerates exactly one hit across both runs
    let sums_mock = server
        .mock("GET", "/1.6.4/terraform_1.6.4_SHA256SUMS")
        .with_status(200)
        .with_body(format!("{}  {}\n", sha256_hex(&zip), artifact))
        .expect(1)
        .create();
    let artifact_mock = server
        .mock("GET", format!("/1.6.4/{}", artifact).as_str())
        .with_status(200)
        .with_body(zip)
        .expect(1)
        .create();

    tvm(store.path(), &url)
        .args(["install", "1.6.4"])
        .assert()
        .success();

    // Second run performs no network access at all
    tvm(store.path(), &url)
        .args(["install", "1.6.4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already installed"));

    sums_mock.assert();
    artifact_mock.assert();
}

#[test]
fn test_install_unknown_version_fails() {
    let mut server = Server::new();
    let url = server.url();
    let store = tempfile::tempdir().unwrap();

    // The release server answers 403 for versions that do not exist
    let _m = server
        .mock("GET", "/9.9.9/terraform_9.9.9_SHA256SUMS")
        .with_status(403)
        .create();

    tvm(store.path(), &url)
        .args(["install", "9.9.9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "terraform 9.9.9 does not exist upstream",
        ));

    assert!(!store.path().join("9.9.9").exists());
}

#[test]
fn test_install_mixed_results_reports_both() {
    let mut server = Server::new();
    let url = server.url();
    let store = tempfile::tempdir().unwrap();

    let zip = create_zip(&[("terraform", "fake terraform binary")]);
    let _release = mock_release(&mut server, "1.5.3", &zip);
    let _missing = server
        .mock("GET", "/1.5.2/terraform_1.5.2_SHA256SUMS")
        .with_status(403)
        .create();

    tvm(store.path(), &url)
        .args(["install", "1.5.2", "1.5.3"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Installed terraform 1.5.3"))
        .stderr(predicate::str::contains("terraform 1.5.2"));

    assert!(!store.path().join("1.5.2").exists());
    assert!(store.path().join("1.5.3").join("terraform").exists());
}

#[test]
fn test_install_checksum_mismatch_leaves_no_trace() {
    let mut server = Server::new();
    let url = server.url();
    let store = tempfile::tempdir().unwrap();

    let key = release_key();
    let artifact = format!("terraform_1.6.4_{}.zip", key);
    let zip = create_zip(&[("terraform", "fake terraform binary")]);

    let _sums = server
        .mock("GET", "/1.6.4/terraform_1.6.4_SHA256SUMS")
        .with_status(200)
        .with_body(format!(
            "{}  {}\n",
            "0".repeat(64), // wrong digest
            artifact
        ))
        .create();
    let _artifact = server
        .mock("GET", format!("/1.6.4/{}", artifact).as_str())
        .with_status(200)
        .with_body(zip)
        .create();

    tvm(store.path(), &url)
        .args(["install", "1.6.4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("checksum mismatch"));

    assert!(!store.path().join("1.6.4").exists());
    // No staging directory is left behind either
    let leftovers: Vec<_> = std::fs::read_dir(store.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(leftovers.is_empty(), "unexpected entries: {:?}", leftovers);
}

#[test]
fn test_use_not_installed_fails() {
    let server = Server::new();
    let store = tempfile::tempdir().unwrap();

    tvm(store.path(), &server.url())
        .args(["use", "1.6.4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("terraform 1.6.4 is not installed"));
}

#[test]
fn test_list_empty_store() {
    let server = Server::new();
    let store = tempfile::tempdir().unwrap();

    tvm(store.path(), &server.url())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No versions installed."));
}

#[test]
fn test_list_orders_numerically() {
    let server = Server::new();
    let store = tempfile::tempdir().unwrap();

    for v in ["1.10.0", "1.2.0", "1.9.0"] {
        let dir = store.path().join(v);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("terraform"), b"bin").unwrap();
    }

    tvm(store.path(), &server.url())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)1\.2\.0.*1\.9\.0.*1\.10\.0").unwrap());
}

#[test]
fn test_install_rejects_invalid_version_token() {
    let server = Server::new();
    let store = tempfile::tempdir().unwrap();

    tvm(store.path(), &server.url())
        .args(["install", "latest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot parse version 'latest'"));
}

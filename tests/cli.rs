//! The built binary, driven the way a process manager would drive it.

#![cfg(unix)]

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

mod common;

fn server(dir: &Path, config_name: &str) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_medplum-server"));
    command
        .arg("serve")
        .current_dir(dir)
        .env("CONFIG_NAME", config_name)
        .env("APP_ENV", "production")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    command
}

fn send_sigterm(child: &Child) {
    let pid = child.id().expect("child already reaped");
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

async fn wait_for_exit(child: &mut Child) -> ExitStatus {
    tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("server did not exit after SIGTERM")
        .unwrap()
}

async fn wait_for_healthcheck(port: u16) -> bool {
    let url = format!("http://127.0.0.1:{port}/healthcheck");
    for _ in 0..200 {
        if let Ok(response) = reqwest::get(&url).await {
            if response.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn sigterm_stops_a_serving_process_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::free_port().await;
    let config = dir.path().join("medplum.config.json");
    std::fs::write(
        &config,
        format!(r#"{{"port": {port}, "shutdownTimeoutMs": 2000}}"#),
    )
    .unwrap();

    let mut child = server(dir.path(), &format!("file:{}", config.display()))
        .spawn()
        .unwrap();

    assert!(wait_for_healthcheck(port).await, "server never became healthy");
    send_sigterm(&child);

    let status = wait_for_exit(&mut child).await;
    assert!(status.success(), "unexpected exit: {status:?}");
    assert!(
        tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err(),
        "port still accepting after exit"
    );
}

#[tokio::test]
async fn failed_startup_stays_alive_until_sigterm() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");

    let mut child = server(dir.path(), &format!("file:{}", missing.display()))
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let waiting = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.contains("waiting for termination signal") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(waiting, "server never reported the failed startup");

    // Not serving, but not exiting on its own either.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(child.try_wait().unwrap().is_none());

    send_sigterm(&child);
    let status = wait_for_exit(&mut child).await;
    assert!(status.success(), "unexpected exit: {status:?}");
}

#[test]
fn seed_twice_leaves_the_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");

    let seed = || {
        std::process::Command::new(env!("CARGO_BIN_EXE_medplum-server"))
            .args(["seed", "--bcrypt-cost", "4", "--store"])
            .arg(&store)
            .current_dir(dir.path())
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    };

    let first = seed();
    assert!(
        first.status.success(),
        "first seed failed: {}",
        String::from_utf8_lossy(&first.stderr)
    );
    let after_first: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(after_first.as_array().map(Vec::len), Some(5));

    let second = seed();
    assert!(
        second.status.success(),
        "second seed failed: {}",
        String::from_utf8_lossy(&second.stderr)
    );
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(
        stdout.contains("Database is already seeded"),
        "second run did not report an existing seed:\n{stdout}"
    );

    let after_second: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(after_first, after_second);
}

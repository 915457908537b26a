//! Drives `DockerRuntime` against `sh -c` stand-ins for the docker CLI.
#![cfg(unix)]

use std::{fs, path::Path};

use beagle_core::{ContainerRuntime, RunRequest, RuntimeError};
use beagle_exec::{DockerConfig, DockerRuntime};
use beagle_model::RequestId;

/// `sh -c <script> sh <subcommand> <args..>`: the subcommand and its args land in `$@`.
fn fake_docker(script: String) -> DockerRuntime {
    DockerRuntime::new(DockerConfig {
        program: "sh".into(),
        base_args: vec!["-c".into(), script, "sh".into()],
    })
    .unwrap()
}

fn quoted(path: &Path) -> String {
    format!("'{}'", path.display())
}

fn archive(bytes: Vec<u8>) -> beagle_core::ArchiveReader {
    Box::new(std::io::Cursor::new(bytes))
}

#[tokio::test]
async fn load_streams_archive_to_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let args = dir.path().join("args");
    let body = dir.path().join("body");
    let runtime = fake_docker(format!(
        "printf '%s\\n' \"$@\" > {}; cat > {}",
        quoted(&args),
        quoted(&body)
    ));

    let payload: Vec<u8> = (0..500_000u32).map(|n| (n % 251) as u8).collect();
    runtime
        .load(&RequestId::from("req"), archive(payload.clone()))
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(&args).unwrap(), "load\n");
    assert_eq!(fs::read(&body).unwrap(), payload);
}

#[tokio::test]
async fn load_failure_carries_diagnostics() {
    let runtime = fake_docker(
        "cat > /dev/null; echo 'open /var/lib/docker/tmp: no space left on device' >&2; exit 1"
            .to_string(),
    );

    let err = runtime
        .load(&RequestId::from("req"), archive(b"not a tarball".to_vec()))
        .await
        .unwrap_err();

    match err {
        RuntimeError::Exit { code, diagnostics } => {
            assert_eq!(code, Some(1));
            assert!(diagnostics.contains("no space left on device"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn load_judged_by_exit_status_when_stdin_ignored() {
    let runtime = fake_docker("exit 0".to_string());

    runtime
        .load(&RequestId::from("req"), archive(vec![0u8; 1 << 20]))
        .await
        .unwrap();
}

#[tokio::test]
async fn run_names_container_and_publishes_ports() {
    let dir = tempfile::tempdir().unwrap();
    let args = dir.path().join("args");
    let runtime = fake_docker(format!("printf '%s\\n' \"$@\" > {}", quoted(&args)));

    let request = RunRequest {
        name: RequestId::from("Zx9Yw8Vu7Ts6Rq5P"),
        image: "web:1.0".into(),
        ports: vec![8080, 9090],
    };
    runtime.run(&request).await.unwrap();

    let recorded = fs::read_to_string(&args).unwrap();
    let recorded: Vec<&str> = recorded.lines().collect();
    assert_eq!(
        recorded,
        ["run", "-d", "--name", "Zx9Yw8Vu7Ts6Rq5P", "-p", "8080", "-p", "9090", "web:1.0"]
    );
}

#[tokio::test]
async fn run_failure_is_exit_error() {
    let runtime = fake_docker(
        "echo 'Conflict. The container name is already in use' >&2; exit 125".to_string(),
    );
    let request = RunRequest {
        name: RequestId::from("dup"),
        image: "web:1.0".into(),
        ports: vec![],
    };

    let err = runtime.run(&request).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Exit { code: Some(125), .. }));
}

#[tokio::test]
async fn unknown_binary_is_spawn_error() {
    let runtime = DockerRuntime::new(DockerConfig {
        program: "/nonexistent/docker".into(),
        base_args: vec![],
    })
    .unwrap();

    let err = runtime
        .load(&RequestId::from("req"), archive(vec![1, 2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Spawn(_)));
}

mod support;

use assert_cmd::Command;
use fleetform::adapter::outbound::file_store::FileStateStore;
use fleetform::domain::{DeploymentState, Role};
use fleetform::port::outbound::store::StateStore;
use fleetform::testkit::config::node_record;
use predicates::prelude::*;
use tempfile::TempDir;

use support::config::{fleet_toml, three_node_toml, write_config};

fn fleetform() -> Command {
    let mut cmd = Command::cargo_bin("fleetform").expect("fleetform binary");
    cmd.env_remove("FLEETFORM_PLATFORM_TOKEN").env_remove("RUST_LOG");
    cmd
}

#[test]
fn missing_config_is_fatal() {
    let dir = TempDir::new().unwrap();

    fleetform()
        .args(["status", "--config"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn duplicate_node_names_are_fatal() {
    let dir = TempDir::new().unwrap();
    let toml = fleet_toml(
        &dir.path().join("state"),
        &[("cp-1", "control-plane"), ("w-1", "worker"), ("w-1", "worker")],
    );
    let config = write_config(dir.path(), &toml);

    fleetform()
        .args(["deploy", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("duplicate node name 'w-1'"));
}

#[test]
fn zero_parallelism_override_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &three_node_toml(&dir.path().join("state")));

    fleetform()
        .args(["deploy", "--parallel", "0", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("parallel"));
}

#[test]
fn status_without_state_succeeds() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &three_node_toml(&dir.path().join("state")));

    fleetform()
        .args(["status", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No deployment state found"));

    assert!(!dir.path().join("state").join("state.json").exists());
}

#[test]
fn status_json_without_state_emits_empty_fleet() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &three_node_toml(&dir.path().join("state")));

    fleetform()
        .args(["--json", "status", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"status""#))
        .stdout(predicate::str::contains(r#""nodes":[]"#));
}

#[test]
fn dry_run_plans_creation_without_writing_state() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("state");
    let config = write_config(dir.path(), &three_node_toml(&state_dir));

    fleetform()
        .args(["--json", "deploy", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"plan""#))
        .stdout(predicate::str::contains(r#""action":"create""#));

    assert!(!state_dir.join("state.json").exists());
}

#[test]
fn non_idempotent_deploy_over_existing_state_is_fatal() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("state");
    let mut state = DeploymentState::empty();
    state.upsert("cp-1", node_record("vm-100", Role::ControlPlane, "10.0.0.10"));
    FileStateStore::new(&state_dir).persist(&state).unwrap();
    let config = write_config(dir.path(), &three_node_toml(&state_dir));

    fleetform()
        .args(["deploy", "--idempotent=false", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("idempotent"));
}

#[test]
fn destroy_without_state_succeeds() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &three_node_toml(&dir.path().join("state")));

    fleetform()
        .args(["destroy", "--yes", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No recorded nodes"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    fleetform()
        .args(["deploy", "--wat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--wat"));
}

//! Deploys persisted through the file stores, as a real run would.

use std::fs;
use std::sync::Arc;

use fleetform::adapter::outbound::file_store::{FileStateStore, FileTokenStore};
use fleetform::application::orchestration::orchestrator::{Dependencies, Orchestrator};
use fleetform::application::orchestration::report::NodeOutcome;
use fleetform::domain::{ClusterHealth, DeploymentPhase};
use fleetform::port::outbound::store::{StateStore, TokenStore};
use fleetform::testkit::config::three_node_fleet;
use fleetform::testkit::harness::{self, Harness};
use fleetform::testkit::resolver::StaticResolver;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn orchestrator(h: &Harness, dir: &TempDir) -> Orchestrator {
    let deps = Dependencies {
        platform: h.platform.clone(),
        channel: h.channel.clone(),
        resolver: Arc::new(StaticResolver::new()),
        runtime: h.runtime.clone(),
        state: Arc::new(FileStateStore::new(dir.path())),
        tokens: Arc::new(FileTokenStore::new(dir.path())),
    };
    Orchestrator::new(three_node_fleet(), deps, harness::settings())
}

#[tokio::test(start_paused = true)]
async fn state_on_disk_survives_between_runs() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new();

    let first = orchestrator(&h, &dir).deploy().await.unwrap();
    assert_eq!(first.count(NodeOutcome::Created), 3);

    let state = FileStateStore::new(dir.path());
    assert!(state.exists());
    let loaded = assert_ok!(state.load());
    assert_eq!(loaded.nodes.len(), 3);
    assert_eq!(loaded.phase, DeploymentPhase::Verified);

    let second = orchestrator(&h, &dir).deploy().await.unwrap();
    assert_eq!(second.count(NodeOutcome::Adopted), 3);
    assert_eq!(second.health, Some(ClusterHealth::Healthy));
    assert_eq!(h.runtime.bootstrap_calls(), 1);
    assert_eq!(h.platform.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn token_is_written_once_and_kept_private() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new();

    orchestrator(&h, &dir).deploy().await.unwrap();

    let tokens = FileTokenStore::new(dir.path());
    let token = assert_ok!(tokens.load()).expect("token on file");
    assert!(token.endpoint().ends_with(":6443"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(tokens.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test(start_paused = true)]
async fn destroy_clears_the_state_directory_files() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new();
    orchestrator(&h, &dir).deploy().await.unwrap();

    let report = orchestrator(&h, &dir).destroy().await.unwrap();

    assert!(report.token_removed);
    assert!(!FileTokenStore::new(dir.path()).path().exists());
    let state = assert_ok!(FileStateStore::new(dir.path()).load());
    assert!(state.is_empty());
    assert!(h.platform.is_empty());
}

#[tokio::test(start_paused = true)]
async fn corrupt_state_file_aborts_before_any_mutation() {
    let dir = TempDir::new().unwrap();
    let store = FileStateStore::new(dir.path());
    fs::write(store.path(), "{ not json").unwrap();
    let h = Harness::new();

    let result = orchestrator(&h, &dir).deploy().await;

    assert_err!(result);
    assert_eq!(h.platform.calls().mutating(), 0);
}

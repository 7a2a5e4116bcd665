use std::fs;
use std::path::{Path, PathBuf};

/// Fleet config for cluster `lab` keeping its state under `state_dir`.
pub fn fleet_toml(state_dir: &Path, nodes: &[(&str, &str)]) -> String {
    let mut toml = format!(
        concat!(
            "state_dir = {state_dir:?}\n",
            "\n",
            "[cluster]\n",
            "name = \"lab\"\n",
            "\n",
            "[platform]\n",
            "base_url = \"http://127.0.0.1:9/api\"\n",
            "\n",
            "[ssh]\n",
            "user = \"ops\"\n",
            "\n",
            "[procedures.install]\n",
            "command = \"fleet install\"\n",
            "[procedures.probe]\n",
            "command = \"fleet members\"\n",
            "[procedures.bootstrap]\n",
            "command = \"fleet bootstrap\"\n",
            "[procedures.join]\n",
            "command = \"fleet join\"\n",
            "[procedures.ready]\n",
            "command = \"fleet ready\"\n",
        ),
        state_dir = state_dir.display().to_string(),
    );
    for (name, role) in nodes {
        toml.push_str(&format!(
            "\n[[nodes]]\nname = \"{name}\"\nrole = \"{role}\"\ncores = 2\nmemory_mb = 4096\ndisk_gb = 20\n"
        ));
    }
    toml
}

/// The canonical three node fleet: `cp-1`, `w-1`, `w-2`.
pub fn three_node_toml(state_dir: &Path) -> String {
    fleet_toml(
        state_dir,
        &[
            ("cp-1", "control-plane"),
            ("w-1", "worker"),
            ("w-2", "worker"),
        ],
    )
}

pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("fleet.toml");
    fs::write(&path, contents).expect("write fleet config");
    path
}

//! Architecture contract tests.

mod support;

use support::architecture::{
    find_lines_containing, find_non_export_lines_in_mod_files, path_exists, read_relative,
};

#[test]
fn cli_has_no_direct_infrastructure_imports() {
    let hits = find_lines_containing(
        "src/adapter/inbound/cli",
        &["use crate::infrastructure", "crate::infrastructure::"],
    );

    assert!(
        hits.is_empty(),
        "found direct infrastructure imports in inbound CLI adapters: {hits:#?}"
    );
}

#[test]
fn domain_has_no_framework_or_outer_layer_imports() {
    let hits = find_lines_containing(
        "src/domain",
        &[
            "crate::adapter",
            "crate::infrastructure",
            "crate::application",
            "crate::port",
            "tokio::",
            "reqwest::",
        ],
    );

    assert!(
        hits.is_empty(),
        "found forbidden imports in domain layer: {hits:#?}"
    );
}

#[test]
fn mod_rs_is_export_only() {
    let violations = find_non_export_lines_in_mod_files("src");
    assert!(
        violations.is_empty(),
        "found non-export content in mod.rs files: {violations:#?}"
    );
}

#[test]
fn cli_operator_bridge_uses_operator_name() {
    let source = read_relative("src/adapter/inbound/cli/operator.rs");
    assert!(
        source.contains("pub fn operator() -> &'static dyn FleetOperator"),
        "operator bridge should expose `operator()` capability accessor"
    );
}

#[test]
fn operator_ports_are_transport_agnostic() {
    let hits = find_lines_containing("src/port/inbound", &["std::path::Path", "PathBuf"]);
    assert!(
        hits.is_empty(),
        "operator inbound ports should not expose filesystem path types: {hits:#?}"
    );
}

#[test]
fn application_layer_has_no_direct_adapter_imports() {
    let hits = find_lines_containing(
        "src/application",
        &["crate::adapter::", "crate::infrastructure::"],
    );
    assert!(
        hits.is_empty(),
        "application layer should not import adapters or infrastructure directly: {hits:#?}"
    );
}

#[test]
fn outbound_adapters_do_not_reach_into_application() {
    let hits = find_lines_containing("src/adapter/outbound", &["crate::application::"]);
    assert!(
        hits.is_empty(),
        "outbound adapters should depend on ports and domain only: {hits:#?}"
    );
}

#[test]
fn orchestrator_is_the_only_state_writer() {
    let hits = find_lines_containing("src/application", &[".persist("]);
    let outside: Vec<_> = hits
        .iter()
        .filter(|(path, _, _)| path != "src/application/orchestration/orchestrator.rs")
        .collect();
    assert!(
        outside.is_empty(),
        "deployment state must only be persisted by the orchestrator: {outside:#?}"
    );
}

#[test]
fn outbound_ports_live_under_port_outbound() {
    for file in [
        "src/port/outbound/platform.rs",
        "src/port/outbound/remote.rs",
        "src/port/outbound/resolver.rs",
        "src/port/outbound/runtime.rs",
        "src/port/outbound/store.rs",
    ] {
        assert!(path_exists(file), "expected outbound port `{file}`");
    }
}

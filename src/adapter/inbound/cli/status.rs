//! `fleetform status`.

use serde_json::json;
use tabled::{Table, Tabled};

use super::operator::operator;
use super::output;
use crate::application::orchestration::report::{StatusReport, EXIT_SUCCESS};
use crate::error::Result;
use crate::port::inbound::operator::Overrides;

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Resource")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

pub async fn execute(config_toml: &str) -> Result<i32> {
    let summary = operator().summary(config_toml, Overrides::default())?;

    output::header("status");
    let spinner = output::spinner("Polling nodes");
    let report = operator().status(config_toml).await;
    spinner.finish_and_clear();
    let report = report?;

    if !report.has_state() {
        if output::is_json() {
            output::emit("status", json!({ "cluster": summary.cluster, "nodes": [] }));
        } else {
            output::note("No deployment state found; nothing has been deployed yet.");
            output::hint(&format!(
                "run {} to provision the fleet",
                output::highlight("fleetform deploy")
            ));
        }
        return Ok(EXIT_SUCCESS);
    }

    render(&summary.cluster, &report);
    Ok(report.exit_code())
}

fn render(cluster: &str, report: &StatusReport) {
    let detail = |name: &str| {
        report
            .checks
            .as_ref()
            .and_then(|checks| checks.check(name))
            .and_then(|check| check.detail())
            .unwrap_or_default()
            .to_string()
    };

    if output::is_json() {
        let nodes: Vec<_> = report
            .state
            .nodes
            .iter()
            .map(|(name, record)| {
                json!({
                    "name": name,
                    "id": record.id,
                    "role": record.role,
                    "address": record.address,
                    "status": record.last_status,
                    "checked_at": record.last_checked_at,
                    "detail": detail(name),
                })
            })
            .collect();
        output::emit(
            "status",
            json!({
                "cluster": cluster,
                "phase": report.state.phase,
                "health": report.health,
                "nodes": nodes,
            }),
        );
        return;
    }

    output::field("cluster", cluster);
    output::field("phase", report.state.phase);
    output::section("Nodes");
    let rows: Vec<StatusRow> = report
        .state
        .nodes
        .iter()
        .map(|(name, record)| StatusRow {
            name: name.clone(),
            role: record.role.to_string(),
            id: record.id.to_string(),
            address: record.address.clone(),
            status: output::status(record.last_status),
            detail: detail(name),
        })
        .collect();
    output::lines(&Table::new(rows).to_string());

    if let Some(health) = report.health {
        output::field("health", output::health(health));
    }
}

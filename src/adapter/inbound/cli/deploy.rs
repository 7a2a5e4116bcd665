//! `fleetform deploy`.

use tabled::{Table, Tabled};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::command::DeployArgs;
use super::operator::operator;
use super::output;
use crate::application::orchestration::report::{DeployReport, NodeOutcome, Plan, EXIT_SUCCESS};
use crate::application::progress::ProgressReporter;
use crate::domain::{Phase, ProgressEvent};
use crate::error::Result;
use crate::port::inbound::operator::Overrides;

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    id: String,
}

pub async fn execute(
    config_toml: &str,
    config_label: &str,
    args: &DeployArgs,
    cancel: watch::Receiver<bool>,
) -> Result<i32> {
    let overrides = Overrides {
        parallel: args.parallel,
        timeout_secs: args.timeout,
        idempotent: args.idempotent,
    };
    let summary = operator().summary(config_toml, overrides)?;

    output::header("deploy");
    output::field("config", config_label);
    output::field("cluster", &summary.cluster);
    output::field(
        "nodes",
        format!(
            "{} ({} control-plane, {} worker)",
            summary.nodes, summary.control_planes, summary.workers
        ),
    );
    output::field("platform", &summary.platform);
    output::field("parallel", summary.max_parallelism);

    if args.dry_run {
        let plan = operator().plan(config_toml, overrides).await?;
        render_plan(&plan);
        return Ok(EXIT_SUCCESS);
    }

    let (progress, events) = ProgressReporter::channel();
    let renderer = tokio::spawn(render_progress(events));
    let result = operator()
        .deploy(config_toml, overrides, progress, cancel)
        .await;
    // The reporter is dropped once deploy returns, which ends the renderer.
    if let Err(err) = renderer.await {
        debug!(error = %err, "Progress renderer stopped");
    }

    let report = result?;
    render_report(&report);
    Ok(report.exit_code())
}

async fn render_progress(mut events: mpsc::UnboundedReceiver<ProgressEvent>) {
    let json = output::is_json();
    let bar = output::progress_bar();
    let mut phase: Option<Phase> = None;

    while let Some(event) = events.recv().await {
        if json {
            output::emit("progress", &event);
            continue;
        }
        if phase != Some(event.phase) {
            phase = Some(event.phase);
            bar.reset();
            bar.set_message(event.phase.to_string());
        }
        bar.set_position(u64::from(event.percent));
    }
    bar.finish_and_clear();
}

fn render_plan(plan: &Plan) {
    if output::is_json() {
        output::emit("plan", plan);
        return;
    }

    output::section("Plan");
    let rows: Vec<PlanRow> = plan
        .entries
        .iter()
        .map(|entry| PlanRow {
            name: entry.name.clone(),
            role: entry.role.to_string(),
            action: entry.action.clone(),
            id: entry.id.clone().unwrap_or_else(|| "-".into()),
        })
        .collect();
    output::lines(&Table::new(rows).to_string());

    for orphan in &plan.orphans {
        output::warning(&format!(
            "{orphan} is recorded but no longer in the fleet; run destroy to remove it"
        ));
    }
    output::hint("dry run: nothing was changed");
}

fn render_report(report: &DeployReport) {
    if output::is_json() {
        output::emit("report", report);
        return;
    }

    output::section("Nodes");
    let rows: Vec<NodeRow> = report
        .nodes
        .iter()
        .map(|node| NodeRow {
            name: node.name.clone(),
            role: node.role.to_string(),
            outcome: node.outcome.to_string(),
            status: node.status.map_or_else(|| "-".into(), output::status),
            error: match (&node.failed_in, &node.error) {
                (Some(phase), Some(error)) => format!("{phase}: {error}"),
                (None, Some(error)) => error.clone(),
                _ => String::new(),
            },
        })
        .collect();
    output::lines(&Table::new(rows).to_string());

    if let Some(bootstrap) = &report.bootstrap {
        output::field("bootstrap", bootstrap.as_str());
    }
    output::field("phase", report.phase);
    match report.health {
        Some(health) => output::field("health", output::health(health)),
        None => output::field("health", output::muted("unknown")),
    }

    if report.cancelled {
        output::warning("deploy was cancelled; re-run to continue");
    } else if report.exit_code() == EXIT_SUCCESS {
        output::success(&format!(
            "{} nodes ready ({} created, {} adopted)",
            report.nodes.len(),
            report.count(NodeOutcome::Created),
            report.count(NodeOutcome::Adopted),
        ));
    } else {
        let failed = report.failed().count();
        if failed > 0 {
            output::warning(&format!("{failed} nodes failed; re-run deploy to retry them"));
        } else {
            output::warning("fleet did not converge to healthy within the verify timeout");
        }
    }
}

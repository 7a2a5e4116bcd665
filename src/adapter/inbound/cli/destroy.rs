//! `fleetform destroy`.

use dialoguer::{theme::ColorfulTheme, Confirm};

use super::command::DestroyArgs;
use super::operator::operator;
use super::output;
use crate::application::orchestration::report::EXIT_SUCCESS;
use crate::error::Result;
use crate::port::inbound::operator::Overrides;

pub async fn execute(config_toml: &str, args: &DestroyArgs) -> Result<i32> {
    let summary = operator().summary(config_toml, Overrides::default())?;
    let recorded = operator().recorded(config_toml)?;

    output::header("destroy");
    if recorded.is_empty() {
        output::note("No recorded nodes.");
    } else {
        output::section("Nodes to delete");
        for (name, record) in &recorded.nodes {
            output::field(name, format!("{} ({})", record.id, record.role));
        }
    }

    if !recorded.is_empty() && !args.yes && !output::is_json() {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Delete {} nodes of cluster '{}'?",
                recorded.nodes.len(),
                summary.cluster
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            output::note("Aborted.");
            return Ok(EXIT_SUCCESS);
        }
    }

    let report = operator().destroy(config_toml).await?;
    if output::is_json() {
        output::emit("destroy", &report);
        return Ok(report.exit_code());
    }

    for name in &report.deleted {
        output::success(&format!("deleted {name}"));
    }
    for (name, error) in &report.failed {
        output::warning(&format!("{name}: {error}"));
    }
    if report.token_removed {
        output::success("removed cluster token and state");
    } else {
        output::hint("token and remaining records kept; re-run destroy to finish");
    }
    Ok(report.exit_code())
}

use std::process::ExitCode;

use clap::Parser;
use fleetform::adapter::inbound::cli::command::Cli;
use fleetform::adapter::inbound::cli::operator;
use fleetform::adapter::inbound::cli::output::{self, OutputConfig};
use fleetform::adapter::inbound::cli::run::run;
use fleetform::application::orchestration::report::{EXIT_FATAL, EXIT_PARTIAL};
use fleetform::infrastructure::operator::entry::Operator;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let _ = operator::install(Box::new(Operator::new()));

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            output::error(&err.to_string());
            if err.is_fatal() {
                EXIT_FATAL
            } else {
                EXIT_PARTIAL
            }
        }
    };

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

//! Command dispatch.

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use super::command::{Cli, Commands};
use super::operator::{operator, read_config_toml};
use super::{deploy, destroy, status};
use crate::error::Result;

/// Read configuration, set up logging and Ctrl-C, then run the command.
///
/// Returns the process exit code for completed runs.
pub async fn run(cli: Cli) -> Result<i32> {
    let config_toml = match read_config_toml(&cli.config) {
        Ok(content) => content,
        Err(err) => {
            operator().init_logging(None, cli.verbose, cli.quiet);
            return Err(err);
        }
    };
    operator().init_logging(Some(&config_toml), cli.verbose, cli.quiet);
    info!(config = %cli.config.display(), "fleetform starting");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight jobs");
            let _ = cancel_tx.send(true);
        }
    });

    match &cli.command {
        Commands::Deploy(args) => {
            deploy::execute(&config_toml, &cli.config.display().to_string(), args, cancel_rx).await
        }
        Commands::Status => status::execute(&config_toml).await,
        Commands::Destroy(args) => destroy::execute(&config_toml, args).await,
    }
}

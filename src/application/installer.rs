//! Bootstrap installer.
//!
//! Runs named setup procedures against nodes over the remote channel.
//! Parameters are serialized once as JSON and delivered on stdin.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::executor::JobHandle;
use super::retry::with_retry;
use crate::domain::RetryPolicy;
use crate::error::{Error, InfraError, Result};
use crate::port::outbound::remote::{CommandOutput, RemoteChannel, RemoteCommand, RemoteNode};

/// Lines of stderr carried in a procedure failure.
const STDERR_TAIL_LINES: usize = 20;

/// Upper bound on one procedure run when none is configured.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// A named remote setup procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub command: String,
    /// Retry non-zero exits too, not only connection failures.
    #[serde(default)]
    pub idempotent_retryable: bool,
}

impl Procedure {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            idempotent_retryable: false,
        }
    }

    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.idempotent_retryable = true;
        self
    }
}

/// Typed key/value parameters for one procedure run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProcedureParams(BTreeMap<String, Value>);

impl ProcedureParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Document written to the procedure's stdin.
#[derive(Serialize)]
struct Invocation<'a> {
    procedure: &'a str,
    node: &'a RemoteNode,
    params: &'a ProcedureParams,
}

/// Runs procedures with the shared retry policy.
#[derive(Clone)]
pub struct Installer {
    channel: Arc<dyn RemoteChannel>,
    retry: RetryPolicy,
    command_timeout: Duration,
}

impl Installer {
    pub fn new(channel: Arc<dyn RemoteChannel>, retry: RetryPolicy) -> Self {
        Self {
            channel,
            retry,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Bound every single procedure run by `command_timeout`.
    #[must_use]
    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Run `procedure` once. A non-zero exit becomes
    /// [`InfraError::ProcedureFailed`], a run past the command timeout
    /// [`InfraError::Timeout`].
    pub async fn run_once(
        &self,
        node: &RemoteNode,
        procedure: &Procedure,
        params: &ProcedureParams,
    ) -> Result<CommandOutput> {
        let payload = serde_json::to_vec(&Invocation {
            procedure: &procedure.name,
            node,
            params,
        })?;
        let command = RemoteCommand::new(procedure.command.clone()).with_stdin(payload);

        let output = match timeout(self.command_timeout, self.channel.exec(node, &command)).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    node = %node.name,
                    procedure = %procedure.name,
                    timeout_secs = self.command_timeout.as_secs(),
                    "Procedure timed out"
                );
                return Err(Error::timeout(
                    format!("procedure {} on {}", procedure.name, node.name),
                    self.command_timeout,
                ));
            }
        };
        if output.success() {
            return Ok(output);
        }

        Err(Error::Infra(InfraError::ProcedureFailed {
            procedure: procedure.name.clone(),
            exit_code: output.exit_code,
            stderr: stderr_tail(&output.stderr),
        }))
    }

    /// Run `procedure` under the retry policy.
    ///
    /// Connection failures are always retried. Non-zero exits are retried only
    /// for procedures tagged idempotent-retryable.
    pub async fn run_remote(
        &self,
        node: &RemoteNode,
        procedure: &Procedure,
        params: &ProcedureParams,
        handle: Option<&JobHandle>,
    ) -> Result<CommandOutput> {
        let retryable = |err: &Error| {
            err.is_transient()
                || (procedure.idempotent_retryable
                    && matches!(err, Error::Infra(InfraError::ProcedureFailed { .. })))
        };

        with_retry(&self.retry, &procedure.name, handle, retryable, |attempt| {
            debug!(
                node = %node.name,
                procedure = %procedure.name,
                attempt,
                "Running procedure"
            );
            self.run_once(node, procedure, params)
        })
        .await
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::testkit::config::fast_retry;
    use crate::testkit::remote::FakeChannel;

    fn node() -> RemoteNode {
        RemoteNode::new("w-1", Role::Worker, "10.0.0.11")
    }

    fn failing(exit_code: i32) -> std::result::Result<CommandOutput, InfraError> {
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: "apt: lock held\n".into(),
            exit_code,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn params_are_delivered_as_json_on_stdin() {
        let channel = Arc::new(FakeChannel::new());
        let installer = Installer::new(channel.clone(), fast_retry());
        let params = ProcedureParams::new()
            .with("cluster", "lab")
            .with("api_port", 6443);

        installer
            .run_remote(
                &node(),
                &Procedure::new("install", "/opt/fleet/install"),
                &params,
                None,
            )
            .await
            .unwrap();

        let calls = channel.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command, "/opt/fleet/install");
        let stdin: Value = serde_json::from_str(calls[0].stdin.as_deref().unwrap()).unwrap();
        assert_eq!(stdin["procedure"], "install");
        assert_eq!(stdin["node"]["name"], "w-1");
        assert_eq!(stdin["params"]["cluster"], "lab");
        assert_eq!(stdin["params"]["api_port"], 6443);
    }

    #[tokio::test(start_paused = true)]
    async fn non_zero_exit_fails_without_retry() {
        let channel = Arc::new(FakeChannel::new());
        channel.respond("w-1", "install", failing(2));
        let installer = Installer::new(channel.clone(), fast_retry());

        let err = installer
            .run_remote(
                &node(),
                &Procedure::new("install", "install"),
                &ProcedureParams::new(),
                None,
            )
            .await
            .unwrap_err();

        match err {
            Error::Infra(InfraError::ProcedureFailed {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "apt: lock held");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(channel.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_procedure_retries_non_zero_exit() {
        let channel = Arc::new(FakeChannel::new());
        channel.respond("w-1", "install", failing(1));
        let installer = Installer::new(channel.clone(), fast_retry());
        let procedure = Procedure::new("install", "install").retryable();

        installer
            .run_remote(&node(), &procedure, &ProcedureParams::new(), None)
            .await
            .unwrap();

        assert_eq!(channel.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_node_is_retried_then_fails() {
        let channel = Arc::new(FakeChannel::new());
        channel.unreachable("w-1");
        let policy = fast_retry();
        let installer = Installer::new(channel.clone(), policy.clone());

        let err = installer
            .run_remote(
                &node(),
                &Procedure::new("install", "install"),
                &ProcedureParams::new(),
                None,
            )
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(channel.calls().len(), policy.max_attempts as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_procedure_fails_at_the_command_timeout() {
        let channel = Arc::new(FakeChannel::new());
        channel.hang("w-1");
        let installer = Installer::new(channel.clone(), fast_retry())
            .with_command_timeout(Duration::from_secs(30));

        let started = tokio::time::Instant::now();
        let err = installer
            .run_remote(
                &node(),
                &Procedure::new("join", "join"),
                &ProcedureParams::new(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Infra(InfraError::Timeout { elapsed, .. }) if elapsed == Duration::from_secs(30)
        ));
        assert!(err.to_string().contains("procedure join on w-1"));
        // A timeout is not transient, so the run is not repeated.
        assert_eq!(channel.calls().len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&stderr);
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert!(tail.ends_with("line 49"));
    }
}

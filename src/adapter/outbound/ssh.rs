//! Remote command channel over the system `ssh` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::port::outbound::remote::{CommandOutput, RemoteChannel, RemoteCommand, RemoteNode};

/// Exit code ssh itself uses for connection-level failures.
const SSH_CONNECT_FAILURE: i32 = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on one remote procedure run, handshake included.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Binary to invoke.
    #[serde(default = "default_program")]
    pub program: String,
}

const fn default_port() -> u16 {
    22
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_command_timeout_secs() -> u64 {
    600
}

fn default_program() -> String {
    "ssh".into()
}

impl SshConfig {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            port: default_port(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            program: default_program(),
        }
    }
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

pub struct SshChannel {
    config: SshConfig,
}

impl SshChannel {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Arguments passed to the ssh binary for `command` on `node`.
    fn args(&self, node: &RemoteNode, command: &RemoteCommand) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-p".to_string(),
            self.config.port.to_string(),
        ];
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".to_string());
            args.push(expand_home(identity).display().to_string());
        }
        args.push(format!("{}@{}", self.config.user, node.address));
        args.push("--".to_string());
        args.push(command.command.clone());
        args
    }

    fn classify(node: &RemoteNode, output: CommandOutput) -> Result<CommandOutput> {
        if output.exit_code == SSH_CONNECT_FAILURE {
            return Err(Error::transient(format!(
                "ssh to {} ({}) failed: {}",
                node.name,
                node.address,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn exec(&self, node: &RemoteNode, command: &RemoteCommand) -> Result<CommandOutput> {
        debug!(
            node = %node.name,
            address = %node.address,
            command = %command.command,
            "Running remote command"
        );

        let mut child = Command::new(&self.config.program)
            .args(self.args(node, command))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(bytes), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin.write_all(bytes).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal: report like a dropped connection.
            exit_code: output.status.code().unwrap_or(SSH_CONNECT_FAILURE),
        };
        Self::classify(node, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn node() -> RemoteNode {
        RemoteNode::new("w-1", Role::Worker, "10.0.0.11")
    }

    #[test]
    fn identity_under_home_is_expanded() {
        let expanded = expand_home(Path::new("~/.ssh/fleet"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join(".ssh/fleet"));
        }
        assert_eq!(expand_home(Path::new("/keys/fleet")), PathBuf::from("/keys/fleet"));
    }

    #[test]
    fn args_disable_prompts_and_bound_connect() {
        let mut config = SshConfig::new("ops");
        config.port = 2222;
        config.identity_file = Some(PathBuf::from("/keys/fleet"));
        let channel = SshChannel::new(config);

        let args = channel.args(&node(), &RemoteCommand::new("fleet install"));

        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/fleet"]));
        assert_eq!(&args[args.len() - 3..], ["ops@10.0.0.11", "--", "fleet install"]);
    }

    #[test]
    fn exit_255_is_transient() {
        let output = CommandOutput {
            exit_code: 255,
            stderr: "Connection refused\n".into(),
            ..CommandOutput::default()
        };
        let err = SshChannel::classify(&node(), output).unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn procedure_exit_codes_pass_through() {
        let output = CommandOutput {
            exit_code: 3,
            ..CommandOutput::default()
        };
        assert_eq!(SshChannel::classify(&node(), output).unwrap().exit_code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdin_reaches_the_program() {
        // Stand-in binary that ignores its args and echoes stdin.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ssh");
        std::fs::write(&script, "#!/bin/sh\ncat\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let mut config = SshConfig::new("ops");
        config.program = script.display().to_string();
        let channel = SshChannel::new(config);

        let output = channel
            .exec(
                &node(),
                &RemoteCommand::new("fleet install")
                    .with_stdin(br#"{"procedure":"install"}"#.to_vec()),
            )
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, r#"{"procedure":"install"}"#);
    }
}

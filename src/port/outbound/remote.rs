//! Remote command channel port.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{NodeRecord, Role};
use crate::error::Result;

/// Address and identity of a node a command runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteNode {
    pub name: String,
    pub role: Role,
    pub address: String,
}

impl RemoteNode {
    pub fn new(name: impl Into<String>, role: Role, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            address: address.into(),
        }
    }

    pub fn from_record(name: &str, record: &NodeRecord) -> Self {
        Self::new(name, record.role, record.address.clone())
    }
}

/// One command to run remotely.
///
/// `command` is passed verbatim to the remote shell. Parameters travel as a
/// JSON document on stdin, never spliced into the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub command: String,
    pub stdin: Option<Vec<u8>>,
}

impl RemoteCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Run `command` on `node`.
    ///
    /// A node that cannot be reached within the connect timeout fails with a
    /// transient error. A command that runs and exits non-zero is *not* an
    /// error here; it comes back in [`CommandOutput::exit_code`].
    async fn exec(&self, node: &RemoteNode, command: &RemoteCommand) -> Result<CommandOutput>;
}

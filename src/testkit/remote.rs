//! Scripted remote command channel.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, InfraError, Result};
use crate::port::outbound::remote::{CommandOutput, RemoteChannel, RemoteCommand, RemoteNode};

/// One recorded exec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub node: String,
    pub command: String,
    pub stdin: Option<String>,
}

struct Script {
    node: String,
    pattern: String,
    responses: VecDeque<std::result::Result<CommandOutput, InfraError>>,
}

/// Channel that records every exec and answers from a script.
///
/// Unscripted commands succeed with empty output. Unreachable nodes fail
/// every exec with a transient error; hung nodes never answer.
#[derive(Default)]
pub struct FakeChannel {
    scripts: Mutex<Vec<Script>>,
    unreachable: Mutex<HashSet<String>>,
    hung: Mutex<HashSet<String>>,
    calls: Mutex<Vec<ExecCall>>,
}

impl FakeChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for the next exec on `node` whose command contains
    /// `pattern`.
    pub fn respond(
        &self,
        node: &str,
        pattern: &str,
        response: std::result::Result<CommandOutput, InfraError>,
    ) {
        let mut scripts = self.scripts.lock();
        if let Some(script) = scripts
            .iter_mut()
            .find(|script| script.node == node && script.pattern == pattern)
        {
            script.responses.push_back(response);
            return;
        }
        scripts.push(Script {
            node: node.to_string(),
            pattern: pattern.to_string(),
            responses: VecDeque::from([response]),
        });
    }

    pub fn unreachable(&self, node: &str) {
        self.unreachable.lock().insert(node.to_string());
    }

    pub fn reachable(&self, node: &str) {
        self.unreachable.lock().remove(node);
    }

    /// Every later exec on `node` hangs forever.
    pub fn hang(&self, node: &str) {
        self.hung.lock().insert(node.to_string());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn calls_for(&self, node: &str) -> Vec<ExecCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.node == node)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteChannel for FakeChannel {
    async fn exec(&self, node: &RemoteNode, command: &RemoteCommand) -> Result<CommandOutput> {
        self.calls.lock().push(ExecCall {
            node: node.name.clone(),
            command: command.command.clone(),
            stdin: command
                .stdin
                .as_ref()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        });

        if self.unreachable.lock().contains(&node.name) {
            return Err(Error::transient(format!(
                "ssh: connect to host {} port 22: Connection timed out",
                node.address
            )));
        }

        let hung = self.hung.lock().contains(&node.name);
        if hung {
            std::future::pending::<()>().await;
        }

        let scripted = self
            .scripts
            .lock()
            .iter_mut()
            .find(|script| {
                script.node == node.name
                    && command.command.contains(&script.pattern)
                    && !script.responses.is_empty()
            })
            .and_then(|script| script.responses.pop_front());

        match scripted {
            Some(response) => response.map_err(Error::Infra),
            None => Ok(CommandOutput::default()),
        }
    }
}

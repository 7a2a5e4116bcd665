//! Units of work owned by the parallel executor.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::JobId;
use super::node::NodeSpec;

/// Sequential orchestration stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Provision,
    Bootstrap,
    Join,
    Install,
    Verify,
}

impl Phase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Bootstrap => "bootstrap",
            Self::Join => "join",
            Self::Install => "install",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Provision,
    Install,
    Join,
}

impl JobKind {
    /// Phase in which jobs of this kind run.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Provision => Phase::Provision,
            Self::Install => Phase::Install,
            Self::Join => Phase::Join,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Running or retrying: the job holds a worker slot.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Retrying)
    }
}

/// A unit of work against one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub target: NodeSpec,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
}

impl Job {
    /// New pending job allowed up to `max_attempts` attempts.
    #[must_use]
    pub fn new(kind: JobKind, target: NodeSpec, max_attempts: u32) -> Self {
        Self {
            id: JobId::new(),
            kind,
            target,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Start the next attempt.
    ///
    /// Returns `false`, leaving the job unchanged, when the next attempt would
    /// exceed `max_attempts` or the job is already terminal.
    pub fn begin_attempt(&mut self) -> bool {
        if self.status.is_terminal() || self.attempts >= self.max_attempts {
            return false;
        }
        self.attempts += 1;
        self.status = if self.attempts == 1 {
            JobStatus::Running
        } else {
            JobStatus::Retrying
        };
        true
    }

    pub fn finish(&mut self, succeeded: bool) {
        self.status = if succeeded {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
    }
}

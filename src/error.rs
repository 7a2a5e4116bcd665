use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors with structured variants.
///
/// Every variant is fatal: a run that hits one aborts before (or instead of)
/// any further mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("duplicate node name '{name}' in fleet")]
    DuplicateNode { name: String },

    #[error(
        "resource {id} is requested as '{expected_name}' ({expected_role}) but the platform reports '{actual_name}' ({actual_role})"
    )]
    ResourceMismatch {
        id: String,
        expected_name: String,
        expected_role: String,
        actual_name: String,
        actual_role: String,
    },

    #[error("failed to read config file: {0}")]
    ReadFile(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

/// Errors raised at the boundary with external infrastructure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfraError {
    /// Retryable: connection refused, not yet reachable, rate limited.
    #[error("transient infrastructure error: {0}")]
    Transient(String),

    /// The resource already exists on the platform. Resolved by adoption.
    #[error("resource already exists: {id}")]
    ResourceConflict { id: String },

    /// The cluster control plane was already bootstrapped.
    #[error("cluster bootstrap already done on {endpoint}")]
    BootstrapAlreadyDone { endpoint: String },

    #[error("timed out after {}s waiting for {what}", .elapsed.as_secs())]
    Timeout { what: String, elapsed: Duration },

    #[error("procedure '{procedure}' exited with code {exit_code}: {stderr}")]
    ProcedureFailed {
        procedure: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("resource not found: {id}")]
    NotFound { id: String },

    #[error("platform rejected request: {0}")]
    Rejected(String),

    #[error("worker task failed: {0}")]
    WorkerFailed(String),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("illegal cluster formation transition from {from} to {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the operation that produced this error may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Infra(InfraError::Transient(_)) => true,
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Whether this error must abort the whole run rather than one job.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::IllegalTransition { .. })
    }

    /// Shorthand for a transient infrastructure error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Infra(InfraError::Transient(message.into()))
    }

    /// Shorthand for a timeout on `what`.
    pub fn timeout(what: impl Into<String>, elapsed: Duration) -> Self {
        Self::Infra(InfraError::Timeout {
            what: what.into(),
            elapsed,
        })
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.into())
    }
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        // dialoguer::Error wraps an IO error
        Error::Io(std::io::Error::other(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::transient("connection refused").is_transient());
        assert!(!Error::timeout("boot", Duration::from_secs(300)).is_transient());
        assert!(
            !Error::Infra(InfraError::ProcedureFailed {
                procedure: "install".into(),
                exit_code: 1,
                stderr: String::new(),
            })
            .is_transient()
        );
    }

    #[test]
    fn only_config_errors_are_fatal() {
        let fatal = Error::Config(ConfigError::DuplicateNode { name: "cp-1".into() });
        assert!(fatal.is_fatal());
        assert!(!Error::transient("x").is_fatal());
        assert!(!Error::Infra(InfraError::Cancelled).is_fatal());
    }

    #[test]
    fn timeout_message_reports_seconds() {
        let err = Error::timeout("node cp-1 to reach running", Duration::from_secs(300));
        assert_eq!(
            err.to_string(),
            "timed out after 300s waiting for node cp-1 to reach running"
        );
    }

    #[test]
    fn mismatch_message_separates_request_from_platform() {
        let err = ConfigError::ResourceMismatch {
            id: "vm-101".into(),
            expected_name: "w-1".into(),
            expected_role: "control-plane".into(),
            actual_name: "w-1".into(),
            actual_role: "worker".into(),
        };
        assert_eq!(
            err.to_string(),
            "resource vm-101 is requested as 'w-1' (control-plane) but the platform reports 'w-1' (worker)"
        );
    }
}

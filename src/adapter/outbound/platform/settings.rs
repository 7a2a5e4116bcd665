//! Compute platform API configuration.

use serde::Deserialize;

/// Environment variable holding the platform API token.
pub const TOKEN_ENV: &str = "FLEETFORM_PLATFORM_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the resource API, e.g. `https://pve.lab:8006/api`.
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bearer token. Loaded from [`TOKEN_ENV`], never from the file.
    #[serde(skip)]
    pub token: Option<String>,
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl PlatformConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            token: None,
        }
    }

    /// Pick up the API token from the environment.
    #[must_use]
    pub fn with_env_token(mut self) -> Self {
        self.token = std::env::var(TOKEN_ENV).ok().filter(|token| !token.is_empty());
        self
    }
}

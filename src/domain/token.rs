//! Cluster join token.

use std::fmt;

use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_LEN: usize = 6;
const SECRET_LEN: usize = 16;

/// Shared secret plus control-plane endpoint handed to joining nodes.
///
/// `Debug` and `Display` only ever show the short prefix.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterToken {
    token: String,
    endpoint: String,
}

impl ClusterToken {
    /// Generate a fresh `xxxxxx.xxxxxxxxxxxxxxxx` token for `endpoint`.
    pub fn generate<R: Rng + ?Sized>(endpoint: impl Into<String>, rng: &mut R) -> Self {
        let id = Alphanumeric.sample_string(rng, ID_LEN).to_ascii_lowercase();
        let secret = Alphanumeric
            .sample_string(rng, SECRET_LEN)
            .to_ascii_lowercase();
        Self {
            token: format!("{id}.{secret}"),
            endpoint: endpoint.into(),
        }
    }

    /// Wrap an existing token value.
    pub fn new(token: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Full secret value. Never log this.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Operator-visible prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        let end = self
            .token
            .char_indices()
            .nth(ID_LEN)
            .map_or(self.token.len(), |(index, _)| index);
        &self.token[..end]
    }
}

impl fmt::Debug for ClusterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterToken")
            .field("token", &format_args!("{}…", self.prefix()))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl fmt::Display for ClusterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn generated_token_has_expected_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let token = ClusterToken::generate("https://10.0.0.10:6443", &mut rng);
        let (id, secret) = token.secret().split_once('.').unwrap();

        assert_eq!(id.len(), 6);
        assert_eq!(secret.len(), 16);
        assert!(token
            .secret()
            .chars()
            .all(|c| c == '.' || c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(token.endpoint(), "https://10.0.0.10:6443");
    }

    #[test]
    fn formatting_never_reveals_secret() {
        let token = ClusterToken::new("abcdef.0123456789abcdef", "https://cp:6443");
        let debug = format!("{token:?}");
        let display = token.to_string();

        assert!(!debug.contains("0123456789abcdef"));
        assert!(!display.contains("0123456789abcdef"));
        assert!(display.starts_with("abcdef"));
    }

    #[test]
    fn file_layout_is_token_and_endpoint() {
        let token = ClusterToken::new("abcdef.0123456789abcdef", "https://cp:6443");
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["token"], "abcdef.0123456789abcdef");
        assert_eq!(json["endpoint"], "https://cp:6443");
    }
}

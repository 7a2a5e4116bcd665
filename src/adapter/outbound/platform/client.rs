//! Resource API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::dto::{CreateRequest, CreatedResponse, ErrorResponse};
use super::settings::PlatformConfig;
use crate::domain::{NodeSpec, ResourceId, ResourceInfo, ResourcePatch};
use crate::error::{Error, InfraError, Result};
use crate::port::outbound::platform::ComputePlatform;

/// HTTP client for the compute platform.
///
/// Performs one request per call. Retrying transient failures is the
/// caller's job, under the shared retry policy.
pub struct HttpPlatform {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl HttpPlatform {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &PlatformConfig) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn resource_url(&self, id: &ResourceId) -> String {
        format!("{}/resources/{}", self.base_url, id.as_str())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        Ok(request.send().await?)
    }

    /// Map a non-success response onto the error taxonomy.
    async fn failure(response: Response, id: Option<&ResourceId>) -> Error {
        let status = response.status();
        let body: ErrorResponse = response.json().await.unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

        match status {
            StatusCode::CONFLICT => match body.id {
                Some(id) => InfraError::ResourceConflict { id }.into(),
                None => InfraError::Rejected(format!("{status}: {message}")).into(),
            },
            StatusCode::NOT_FOUND => InfraError::NotFound {
                id: id.map_or_else(|| message.clone(), ToString::to_string),
            }
            .into(),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
                Error::transient(format!("{status}: {message}"))
            }
            status if status.is_server_error() => Error::transient(format!("{status}: {message}")),
            _ => InfraError::Rejected(format!("{status}: {message}")).into(),
        }
    }

    async fn expect_success(response: Response, id: &ResourceId) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::failure(response, Some(id)).await)
        }
    }
}

#[async_trait]
impl ComputePlatform for HttpPlatform {
    async fn create(&self, spec: &NodeSpec) -> Result<ResourceId> {
        let url = format!("{}/resources", self.base_url);
        debug!(node = %spec.name, url = %url, "Creating resource");

        let response = self
            .send(self.http.post(&url).json(&CreateRequest::from(spec)))
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response, None).await);
        }
        let created: CreatedResponse = response.json().await?;
        Ok(ResourceId::new(created.id))
    }

    async fn start(&self, id: &ResourceId) -> Result<()> {
        let url = format!("{}/start", self.resource_url(id));
        let response = self.send(self.http.post(&url)).await?;
        Self::expect_success(response, id).await?;
        Ok(())
    }

    async fn status(&self, id: &ResourceId) -> Result<ResourceInfo> {
        let response = self.send(self.http.get(self.resource_url(id))).await?;
        let response = Self::expect_success(response, id).await?;
        Ok(response.json().await?)
    }

    async fn resize(&self, id: &ResourceId, patch: &ResourcePatch) -> Result<()> {
        let response = self
            .send(self.http.patch(self.resource_url(id)).json(patch))
            .await?;
        Self::expect_success(response, id).await?;
        Ok(())
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        let response = self.send(self.http.delete(self.resource_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = %id, "Resource already absent");
            return Ok(());
        }
        Self::expect_success(response, id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::domain::{ResourceState, Role};
    use crate::testkit::config::node_spec;

    /// Serve one canned `(status, body)` per connection, recording
    /// `"METHOD /path"` and the request body.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let head_end = loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
                let length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                while buf.len() < head_end + length {
                    let n = socket.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request_line = head.lines().next().unwrap_or_default();
                let mut parts = request_line.split_whitespace();
                let entry = format!(
                    "{} {} {}",
                    parts.next().unwrap_or_default(),
                    parts.next().unwrap_or_default(),
                    String::from_utf8_lossy(&buf[head_end..head_end + length])
                );
                log.lock().push(entry.trim_end().to_string());

                let reply = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{addr}/api"), seen)
    }

    #[tokio::test]
    async fn create_posts_spec_and_returns_id() {
        let (base, seen) = serve(vec![(201, r#"{"id":"vm-101"}"#)]).await;
        let platform = HttpPlatform::new(base);

        let id = platform.create(&node_spec("cp-1", Role::ControlPlane)).await.unwrap();

        assert_eq!(id.as_str(), "vm-101");
        let seen = seen.lock();
        assert!(seen[0].starts_with("POST /api/resources {"));
        assert!(seen[0].contains(r#""role":"control-plane""#));
        assert!(seen[0].contains(r#""memory_mb":4096"#));
    }

    #[tokio::test]
    async fn conflict_carries_existing_id() {
        let (base, _) = serve(vec![(409, r#"{"message":"exists","id":"vm-7"}"#)]).await;
        let platform = HttpPlatform::new(base);

        let err = platform.create(&node_spec("w-1", Role::Worker)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Infra(InfraError::ResourceConflict { ref id }) if id == "vm-7"
        ));
    }

    #[tokio::test]
    async fn status_decodes_resource() {
        let body = r#"{"id":"vm-7","name":"w-1","role":"worker","state":"running","cores":2,"memory_mb":4096,"address":"10.0.0.7"}"#;
        let (base, seen) = serve(vec![(200, body)]).await;
        let platform = HttpPlatform::new(base);

        let info = platform.status(&ResourceId::new("vm-7")).await.unwrap();

        assert_eq!(info.state, ResourceState::Running);
        assert_eq!(info.role, Some(Role::Worker));
        assert_eq!(info.address.as_deref(), Some("10.0.0.7"));
        assert_eq!(seen.lock()[0], "GET /api/resources/vm-7");
    }

    #[tokio::test]
    async fn server_errors_are_transient_and_client_errors_are_not() {
        let (base, _) = serve(vec![(503, "{}"), (400, r#"{"message":"bad cores"}"#)]).await;
        let platform = HttpPlatform::new(base);
        let id = ResourceId::new("vm-7");

        assert!(platform.start(&id).await.unwrap_err().is_transient());
        let err = platform.start(&id).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("bad cores"));
    }

    #[tokio::test]
    async fn status_of_missing_resource_is_not_found() {
        let (base, _) = serve(vec![(404, "{}")]).await;
        let platform = HttpPlatform::new(base);

        let err = platform.status(&ResourceId::new("vm-9")).await.unwrap_err();
        assert!(matches!(err, Error::Infra(InfraError::NotFound { ref id }) if id == "vm-9"));
    }

    #[tokio::test]
    async fn deleting_absent_resource_succeeds() {
        let (base, seen) = serve(vec![(404, "{}")]).await;
        let platform = HttpPlatform::new(base);

        platform.delete(&ResourceId::new("vm-9")).await.unwrap();
        assert_eq!(seen.lock()[0], "DELETE /api/resources/vm-9");
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let platform = HttpPlatform::new(format!("http://{addr}"));

        let err = platform.status(&ResourceId::new("vm-1")).await.unwrap_err();
        assert!(err.is_transient());
    }
}

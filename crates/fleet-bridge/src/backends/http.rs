//! HTTP-backed collaborators
//!
//! `HttpTrustAnchorSource` downloads the root CA certificate and caches it.
//! `HttpBroker` publishes through a broker's HTTPS publish endpoint.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::broker::{validate_publish_topic, MessageBroker, QoS};
use crate::error::{BridgeError, Result};
use crate::trust_anchor::TrustAnchorSource;

/// Timeout for every outbound HTTP call
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| BridgeError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Root CA source fetching a PEM document over HTTPS
pub struct HttpTrustAnchorSource {
    url: String,
    cache: Cache<String, String>,
    http_client: reqwest::Client,
}

impl HttpTrustAnchorSource {
    /// Create a source for `url`, caching the certificate for an hour
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(3600))
                .max_capacity(1)
                .build(),
            http_client: http_client()?,
        })
    }
}

impl std::fmt::Debug for HttpTrustAnchorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTrustAnchorSource")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl TrustAnchorSource for HttpTrustAnchorSource {
    async fn fetch_root_ca(&self) -> Result<String> {
        if let Some(cached) = self.cache.get(&self.url).await {
            debug!(url = %self.url, "Using cached root CA");
            return Ok(cached);
        }

        debug!(url = %self.url, "Fetching root CA");
        let pem = self
            .http_client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| BridgeError::Unavailable(format!("root CA fetch failed: {}", e)))?
            .text()
            .await?;

        if !pem.contains("BEGIN CERTIFICATE") {
            warn!(url = %self.url, "Root CA response is not a PEM certificate");
            return Err(BridgeError::Internal("root CA response is not PEM".into()));
        }

        self.cache.insert(self.url.clone(), pem.clone()).await;
        Ok(pem)
    }

    fn description(&self) -> &str {
        "HTTPS trust anchor"
    }
}

/// Broker publishing over an HTTPS endpoint
///
/// Each publish is `POST {endpoint}/topics/{topic}?qos={level}` with the
/// payload as the body. The topic is a single percent-encoded path segment.
pub struct HttpBroker {
    endpoint: Url,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl HttpBroker {
    /// Create a broker client for `endpoint`
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            token: None,
            http_client: http_client()?,
        })
    }

    /// Authenticate publishes with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build the publish URL for a topic
    pub fn publish_url(&self, topic: &str, qos: QoS) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BridgeError::InvalidRequest("broker endpoint cannot be a base".into()))?
            .pop_if_empty()
            .push("topics")
            .push(topic);
        url.query_pairs_mut()
            .clear()
            .append_pair("qos", &qos.level().to_string());
        Ok(url)
    }
}

impl std::fmt::Debug for HttpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBroker")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[async_trait]
impl MessageBroker for HttpBroker {
    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<()> {
        validate_publish_topic(topic)?;
        let url = self.publish_url(topic, qos)?;

        let mut request = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(topic = %topic, status = %status, "Broker rejected publish");
            return Err(match status.as_u16() {
                429 | 503 => BridgeError::Unavailable(format!("{}: {}", status, body)),
                _ => BridgeError::Rejected(format!("{}: {}", status, body)),
            });
        }

        debug!(topic = %topic, qos = qos.level(), "Publish accepted");
        Ok(())
    }

    fn description(&self) -> &str {
        "HTTPS message broker"
    }
}

//! Certificate issuer over an IoT registry's REST control plane
//!
//! Every operation is one request against the registry's resource layout:
//!
//! | Operation | Request |
//! |---|---|
//! | get policy | `GET /policies/{name}` |
//! | create policy | `POST /policies/{name}` |
//! | create keys and certificate | `POST /keys-and-certificate?setAsActive=…` |
//! | attach / detach policy | `PUT` / `POST /target-policies/{name}` |
//! | create / delete thing | `POST` / `DELETE /things/{name}` |
//! | attach / detach principal | `PUT` / `DELETE /things/{name}/principals` |
//! | update certificate status | `PUT /certificates/{id}?newStatus=…` |
//! | delete certificate | `DELETE /certificates/{id}?forceDelete=…` |
//!
//! Requests carry an optional bearer token. A registry that requires signed
//! requests is reached through a signing gateway at `endpoint`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::http::http_client;
use crate::error::{BridgeError, Result};
use crate::issuer::{CertificateIssuer, CertificateStatus, IssuedCertificate};

/// Header naming the principal on thing principal calls
pub const PRINCIPAL_HEADER: &str = "x-amzn-principal";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePolicyRequest<'a> {
    policy_document: &'a str,
}

#[derive(Serialize)]
struct PolicyTargetRequest<'a> {
    target: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyResponse {
    policy_document: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPair {
    public_key: String,
    private_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeysAndCertificateResponse {
    certificate_id: String,
    certificate_arn: String,
    certificate_pem: String,
    key_pair: KeyPair,
}

/// Issuer backed by a remote certificate registry
pub struct HttpIssuer {
    endpoint: Url,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl HttpIssuer {
    /// Create an issuer client for `endpoint`
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            token: None,
            http_client: http_client()?,
        })
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// URL of a registry resource; each segment is percent-encoded
    pub fn resource_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BridgeError::InvalidRequest("issuer endpoint cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        url.set_query(None);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http_client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, mapping non-2xx statuses onto `BridgeError`
    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(resource = %resource, status = %status, "Registry refused request");
        Err(registry_error(status, resource, &body))
    }
}

/// Map a registry status code onto the collaborator error contract
///
/// 404 is the only status reported as `ResourceNotFound`.
pub fn registry_error(status: StatusCode, resource: &str, body: &str) -> BridgeError {
    let detail = if body.is_empty() {
        format!("{} ({})", resource, status)
    } else {
        format!("{} ({}): {}", resource, status, body)
    };
    match status.as_u16() {
        404 => BridgeError::ResourceNotFound(detail),
        409 => BridgeError::ResourceAlreadyExists(detail),
        400 => BridgeError::InvalidRequest(detail),
        401 | 403 => BridgeError::AccessDenied(detail),
        429 | 503 => BridgeError::Unavailable(detail),
        _ => BridgeError::Rejected(detail),
    }
}

fn status_name(status: CertificateStatus) -> &'static str {
    match status {
        CertificateStatus::Active => "ACTIVE",
        CertificateStatus::Inactive => "INACTIVE",
    }
}

impl std::fmt::Debug for HttpIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIssuer")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[async_trait]
impl CertificateIssuer for HttpIssuer {
    async fn get_policy(&self, policy_name: &str) -> Result<String> {
        let url = self.resource_url(&["policies", policy_name])?;
        let resource = format!("policy {}", policy_name);
        let response = self.send(self.request(Method::GET, url), &resource).await?;
        let policy: PolicyResponse = response.json().await?;
        Ok(policy.policy_document)
    }

    async fn create_policy(&self, policy_name: &str, document: &str) -> Result<()> {
        let url = self.resource_url(&["policies", policy_name])?;
        let body = CreatePolicyRequest {
            policy_document: document,
        };
        self.send(
            self.request(Method::POST, url).json(&body),
            &format!("policy {}", policy_name),
        )
        .await?;
        info!(policy = %policy_name, "Registry policy created");
        Ok(())
    }

    async fn create_keys_and_certificate(&self, set_as_active: bool) -> Result<IssuedCertificate> {
        let mut url = self.resource_url(&["keys-and-certificate"])?;
        url.query_pairs_mut()
            .append_pair("setAsActive", if set_as_active { "true" } else { "false" });

        let response = self
            .send(self.request(Method::POST, url), "keys-and-certificate")
            .await?;
        let issued: KeysAndCertificateResponse = response.json().await?;

        info!(certificate_id = %issued.certificate_id, "Registry issued certificate");
        Ok(IssuedCertificate {
            certificate_id: issued.certificate_id,
            certificate_arn: issued.certificate_arn,
            certificate_pem: issued.certificate_pem,
            public_key: issued.key_pair.public_key,
            private_key: issued.key_pair.private_key,
        })
    }

    async fn attach_policy(&self, policy_name: &str, target: &str) -> Result<()> {
        let url = self.resource_url(&["target-policies", policy_name])?;
        self.send(
            self.request(Method::PUT, url)
                .json(&PolicyTargetRequest { target }),
            &format!("policy {} on {}", policy_name, target),
        )
        .await?;
        Ok(())
    }

    async fn detach_policy(&self, policy_name: &str, target: &str) -> Result<()> {
        let url = self.resource_url(&["target-policies", policy_name])?;
        self.send(
            self.request(Method::POST, url)
                .json(&PolicyTargetRequest { target }),
            &format!("policy {} on {}", policy_name, target),
        )
        .await?;
        Ok(())
    }

    async fn create_thing(&self, thing_name: &str) -> Result<()> {
        let url = self.resource_url(&["things", thing_name])?;
        let request = self
            .request(Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{}");
        match self.send(request, &format!("thing {}", thing_name)).await {
            Ok(_) => Ok(()),
            // Creating an identical thing again is not an error
            Err(e) if e.is_already_exists() => {
                debug!(thing = %thing_name, "Thing already registered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn attach_thing_principal(&self, thing_name: &str, principal: &str) -> Result<()> {
        let url = self.resource_url(&["things", thing_name, "principals"])?;
        self.send(
            self.request(Method::PUT, url)
                .header(PRINCIPAL_HEADER, principal),
            &format!("thing {} principal", thing_name),
        )
        .await?;
        Ok(())
    }

    async fn detach_thing_principal(&self, thing_name: &str, principal: &str) -> Result<()> {
        let url = self.resource_url(&["things", thing_name, "principals"])?;
        self.send(
            self.request(Method::DELETE, url)
                .header(PRINCIPAL_HEADER, principal),
            &format!("thing {} principal", thing_name),
        )
        .await?;
        Ok(())
    }

    async fn update_certificate_status(
        &self,
        certificate_id: &str,
        status: CertificateStatus,
    ) -> Result<()> {
        let mut url = self.resource_url(&["certificates", certificate_id])?;
        url.query_pairs_mut()
            .append_pair("newStatus", status_name(status));
        self.send(
            self.request(Method::PUT, url),
            &format!("certificate {}", certificate_id),
        )
        .await?;
        Ok(())
    }

    async fn delete_certificate(&self, certificate_id: &str, force_delete: bool) -> Result<()> {
        let mut url = self.resource_url(&["certificates", certificate_id])?;
        url.query_pairs_mut()
            .append_pair("forceDelete", if force_delete { "true" } else { "false" });
        self.send(
            self.request(Method::DELETE, url),
            &format!("certificate {}", certificate_id),
        )
        .await?;
        Ok(())
    }

    async fn delete_thing(&self, thing_name: &str) -> Result<()> {
        let url = self.resource_url(&["things", thing_name])?;
        self.send(
            self.request(Method::DELETE, url),
            &format!("thing {}", thing_name),
        )
        .await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "HTTPS certificate registry"
    }
}

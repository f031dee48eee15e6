//! Policy and certificate issuer seam
//!
//! The issuer owns device certificates, the shared access policy, and the
//! thing (device identity) entities certificates are bound to. Every
//! detach/delete operation reports [`BridgeError::ResourceNotFound`] when
//! its target is already gone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::{BridgeError, Result};

/// Activation state of an issued certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    Active,
    Inactive,
}

/// Certificate and key material returned by the issuer
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub certificate_id: String,
    pub certificate_arn: String,
    pub certificate_pem: String,
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("certificate_id", &self.certificate_id)
            .field("certificate_arn", &self.certificate_arn)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

/// Issuer operations, used for call accounting and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuerOp {
    GetPolicy,
    CreatePolicy,
    CreateKeysAndCertificate,
    AttachPolicy,
    DetachPolicy,
    CreateThing,
    AttachThingPrincipal,
    DetachThingPrincipal,
    UpdateCertificateStatus,
    DeleteCertificate,
    DeleteThing,
}

/// Policy/certificate issuer
///
/// Implementations must be thread-safe; calls are treated as blocking RPCs
/// with no retry.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Fetch a policy document by name
    async fn get_policy(&self, policy_name: &str) -> Result<String>;

    /// Create a named policy; `ResourceAlreadyExists` if the name is taken
    async fn create_policy(&self, policy_name: &str, document: &str) -> Result<()>;

    /// Mint a certificate together with a fresh key pair
    async fn create_keys_and_certificate(&self, set_as_active: bool) -> Result<IssuedCertificate>;

    /// Attach a policy to a certificate
    async fn attach_policy(&self, policy_name: &str, target: &str) -> Result<()>;

    /// Detach a policy from a certificate
    async fn detach_policy(&self, policy_name: &str, target: &str) -> Result<()>;

    /// Register a device identity entity
    async fn create_thing(&self, thing_name: &str) -> Result<()>;

    /// Bind a certificate as a thing's principal
    async fn attach_thing_principal(&self, thing_name: &str, principal: &str) -> Result<()>;

    /// Remove a certificate from a thing's principals
    async fn detach_thing_principal(&self, thing_name: &str, principal: &str) -> Result<()>;

    /// Change a certificate's activation state
    async fn update_certificate_status(
        &self,
        certificate_id: &str,
        status: CertificateStatus,
    ) -> Result<()>;

    /// Delete a certificate. Active certificates are refused.
    async fn delete_certificate(&self, certificate_id: &str, force_delete: bool) -> Result<()>;

    /// Delete a device identity entity
    async fn delete_thing(&self, thing_name: &str) -> Result<()>;

    /// Create the policy if it does not exist yet
    ///
    /// A concurrent creator winning the race (`ResourceAlreadyExists`) counts
    /// as success.
    async fn ensure_policy(&self, policy_name: &str, document: &str) -> Result<()> {
        match self.get_policy(policy_name).await {
            Ok(_) => {
                debug!(policy = %policy_name, "Policy already exists");
                return Ok(());
            }
            Err(BridgeError::ResourceNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        info!(policy = %policy_name, "Policy not found, creating");
        match self.create_policy(policy_name, document).await {
            Ok(()) => {
                info!(policy = %policy_name, "Policy created");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(policy = %policy_name, "Policy created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Get a description of this issuer (for logging)
    fn description(&self) -> &str {
        "certificate issuer"
    }
}

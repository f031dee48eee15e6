//! Device identity lifecycle
//!
//! `provision` is idempotent per device: a stored record is returned as-is and
//! no second certificate is minted. First-time provisioning is not
//! transactional; a failed step leaves earlier issuer side effects in place.
//! `unprovision` runs the absent-tolerant [`Teardown`] sequence.
//!
//! No per-device mutual exclusion is enforced. Two concurrent first-time
//! provisions can both issue a certificate; the store keeps the last write.

use fleet_bridge::{CertificateIssuer, TrustAnchorSource};
use fleet_core::{AccessPolicy, CredentialBundle, DeviceCredentialRecord, DeviceId};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info};

use super::error::OperationError;
use super::teardown::{Teardown, TeardownReport};
use crate::storage::CredentialStore;

/// Result of a successful provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub bundle: CredentialBundle,
    /// `false` when the stored credentials were returned
    pub newly_issued: bool,
}

/// Orchestrates provision and unprovision over the issuer and credential store
pub struct LifecycleManager {
    issuer: Arc<dyn CertificateIssuer>,
    store: Arc<dyn CredentialStore>,
    trust_anchor: Arc<dyn TrustAnchorSource>,
    policy: AccessPolicy,
}

fn provision_failed(device_id: &DeviceId, step: &str, err: impl Display) -> OperationError {
    error!(device_id = %device_id, step = step, error = %err, "Provisioning failed");
    OperationError::ProvisionFailed(err.to_string())
}

impl LifecycleManager {
    pub fn new(
        issuer: Arc<dyn CertificateIssuer>,
        store: Arc<dyn CredentialStore>,
        trust_anchor: Arc<dyn TrustAnchorSource>,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            issuer,
            store,
            trust_anchor,
            policy,
        }
    }

    /// The shared access policy attached to every device certificate
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Issue credentials for a device, or return the ones already issued
    pub async fn provision(&self, device_id: &DeviceId) -> Result<ProvisionOutcome, OperationError> {
        let existing = self
            .store
            .get(device_id)
            .await
            .map_err(|e| provision_failed(device_id, "lookup", e))?;
        if let Some(record) = existing {
            info!(
                device_id = %device_id,
                certificate_id = %record.certificate_id,
                "Device already provisioned, returning stored credentials"
            );
            return Ok(ProvisionOutcome {
                bundle: record.bundle(),
                newly_issued: false,
            });
        }

        let document = self
            .policy
            .document_json()
            .map_err(|e| provision_failed(device_id, "render_policy", e))?;
        self.issuer
            .ensure_policy(self.policy.name(), &document)
            .await
            .map_err(|e| provision_failed(device_id, "ensure_policy", e))?;

        let root_ca = self
            .trust_anchor
            .fetch_root_ca()
            .await
            .map_err(|e| provision_failed(device_id, "fetch_root_ca", e))?;

        let cert = self
            .issuer
            .create_keys_and_certificate(true)
            .await
            .map_err(|e| provision_failed(device_id, "create_certificate", e))?;
        info!(
            device_id = %device_id,
            certificate_id = %cert.certificate_id,
            "Issued device certificate"
        );

        self.issuer
            .attach_policy(self.policy.name(), &cert.certificate_arn)
            .await
            .map_err(|e| provision_failed(device_id, "attach_policy", e))?;
        self.issuer
            .create_thing(device_id.as_str())
            .await
            .map_err(|e| provision_failed(device_id, "create_thing", e))?;
        self.issuer
            .attach_thing_principal(device_id.as_str(), &cert.certificate_arn)
            .await
            .map_err(|e| provision_failed(device_id, "attach_thing_principal", e))?;

        let record = DeviceCredentialRecord {
            device_id: device_id.clone(),
            certificate_id: cert.certificate_id,
            certificate_arn: cert.certificate_arn,
            root_ca,
            device_cert: cert.certificate_pem,
            private_key: cert.private_key,
            public_key: cert.public_key,
        };
        let bundle = record.bundle();

        self.store
            .put(record)
            .await
            .map_err(|e| provision_failed(device_id, "store_record", e))?;

        info!(device_id = %device_id, "Device provisioned");
        Ok(ProvisionOutcome {
            bundle,
            newly_issued: true,
        })
    }

    /// Tear down a device's certificate, thing, and credential record
    ///
    /// On failure the record is kept so a retry resumes the teardown.
    pub async fn unprovision(&self, device_id: &DeviceId) -> Result<TeardownReport, OperationError> {
        let record = self
            .store
            .get(device_id)
            .await
            .map_err(|e| {
                error!(device_id = %device_id, error = %e, "Credential lookup failed");
                OperationError::UnprovisionFailed(e.to_string())
            })?
            .ok_or_else(|| OperationError::NotFound(device_id.to_string()))?;

        let report = Teardown::new(
            self.issuer.as_ref(),
            self.store.as_ref(),
            self.policy.name(),
            &record,
        )
        .run()
        .await;

        if let Some((step, message)) = report.failure() {
            return Err(OperationError::UnprovisionFailed(format!("{}: {}", step, message)));
        }

        info!(
            device_id = %device_id,
            already_absent = ?report.already_absent(),
            "Device unprovisioned"
        );
        Ok(report)
    }
}

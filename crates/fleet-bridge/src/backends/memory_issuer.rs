//! In-memory issuer backend
//!
//! Models the certificate registry closely enough to act as a test fake and a
//! local development backend: absent targets report `ResourceNotFound`,
//! active certificates cannot be deleted, and thing creation is idempotent.
//! Every call is logged and any operation can be made to fail once.
//!
//! The key material it hands out is not X.509. The "certificate" is random
//! bytes under a `CERTIFICATE` label and the private key is a raw Ed25519
//! seed, so no real broker will accept it. Use [`super::HttpIssuer`] for
//! devices that must connect.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::issuer::{CertificateIssuer, CertificateStatus, IssuedCertificate, IssuerOp};

#[derive(Debug)]
struct CertificateEntry {
    arn: String,
    status: CertificateStatus,
    policies: HashSet<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    policies: HashMap<String, String>,
    certificates: HashMap<String, CertificateEntry>,
    things: HashMap<String, HashSet<String>>,
}

impl RegistryState {
    fn certificate_by_arn(&mut self, arn: &str) -> Option<&mut CertificateEntry> {
        self.certificates.values_mut().find(|c| c.arn == arn)
    }
}

/// In-memory certificate issuer
#[derive(Debug)]
pub struct MemoryIssuer {
    region: String,
    account_id: String,
    state: RwLock<RegistryState>,
    calls: RwLock<Vec<IssuerOp>>,
    faults: RwLock<HashMap<IssuerOp, BridgeError>>,
}

impl MemoryIssuer {
    /// Create an empty issuer for a region and account
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            state: RwLock::new(RegistryState::default()),
            calls: RwLock::new(Vec::new()),
            faults: RwLock::new(HashMap::new()),
        }
    }

    /// Make the next call to `op` fail with `error`
    pub fn fail_on(&self, op: IssuerOp, error: BridgeError) {
        write(&self.faults).insert(op, error);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<IssuerOp> {
        read(&self.calls).clone()
    }

    /// Number of calls made to `op`
    pub fn call_count(&self, op: IssuerOp) -> usize {
        read(&self.calls).iter().filter(|c| **c == op).count()
    }

    /// Number of certificates currently registered
    pub fn certificate_count(&self) -> usize {
        read(&self.state).certificates.len()
    }

    /// Status of a certificate, if it exists
    pub fn certificate_status(&self, certificate_id: &str) -> Option<CertificateStatus> {
        read(&self.state)
            .certificates
            .get(certificate_id)
            .map(|c| c.status)
    }

    /// Policies attached to a certificate
    pub fn attached_policies(&self, certificate_id: &str) -> Vec<String> {
        read(&self.state)
            .certificates
            .get(certificate_id)
            .map(|c| c.policies.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a policy exists
    pub fn has_policy(&self, policy_name: &str) -> bool {
        read(&self.state).policies.contains_key(policy_name)
    }

    /// Whether a thing exists
    pub fn has_thing(&self, thing_name: &str) -> bool {
        read(&self.state).things.contains_key(thing_name)
    }

    /// Principals bound to a thing
    pub fn thing_principals(&self, thing_name: &str) -> Vec<String> {
        read(&self.state)
            .things
            .get(thing_name)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, op: IssuerOp) -> Result<()> {
        write(&self.calls).push(op);
        match write(&self.faults).remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn certificate_arn(&self, certificate_id: &str) -> String {
        format!(
            "arn:aws:iot:{}:{}:cert/{}",
            self.region, self.account_id, certificate_id
        )
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn pem(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for line in body.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl CertificateIssuer for MemoryIssuer {
    async fn get_policy(&self, policy_name: &str) -> Result<String> {
        self.record(IssuerOp::GetPolicy)?;
        read(&self.state)
            .policies
            .get(policy_name)
            .cloned()
            .ok_or_else(|| BridgeError::ResourceNotFound(format!("policy {}", policy_name)))
    }

    async fn create_policy(&self, policy_name: &str, document: &str) -> Result<()> {
        self.record(IssuerOp::CreatePolicy)?;
        let mut state = write(&self.state);
        if state.policies.contains_key(policy_name) {
            return Err(BridgeError::ResourceAlreadyExists(format!(
                "policy {}",
                policy_name
            )));
        }
        state
            .policies
            .insert(policy_name.to_string(), document.to_string());
        Ok(())
    }

    async fn create_keys_and_certificate(&self, set_as_active: bool) -> Result<IssuedCertificate> {
        self.record(IssuerOp::CreateKeysAndCertificate)?;

        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        let mut der = vec![0u8; 96];
        OsRng.fill_bytes(&mut der[..64]);
        der[64..].copy_from_slice(verifying_key.as_bytes());

        let certificate_id = hex(&Sha256::digest(&der));
        let certificate_arn = self.certificate_arn(&certificate_id);
        let status = if set_as_active {
            CertificateStatus::Active
        } else {
            CertificateStatus::Inactive
        };

        write(&self.state).certificates.insert(
            certificate_id.clone(),
            CertificateEntry {
                arn: certificate_arn.clone(),
                status,
                policies: HashSet::new(),
            },
        );

        info!(certificate_id = %certificate_id, status = ?status, "Issued certificate");

        Ok(IssuedCertificate {
            certificate_id,
            certificate_arn,
            certificate_pem: pem("CERTIFICATE", &der),
            public_key: pem("PUBLIC KEY", verifying_key.as_bytes()),
            private_key: pem("PRIVATE KEY", &signing_key.to_bytes()),
        })
    }

    async fn attach_policy(&self, policy_name: &str, target: &str) -> Result<()> {
        self.record(IssuerOp::AttachPolicy)?;
        let mut state = write(&self.state);
        if !state.policies.contains_key(policy_name) {
            return Err(BridgeError::ResourceNotFound(format!("policy {}", policy_name)));
        }
        let cert = state
            .certificate_by_arn(target)
            .ok_or_else(|| BridgeError::ResourceNotFound(format!("target {}", target)))?;
        cert.policies.insert(policy_name.to_string());
        Ok(())
    }

    async fn detach_policy(&self, policy_name: &str, target: &str) -> Result<()> {
        self.record(IssuerOp::DetachPolicy)?;
        let mut state = write(&self.state);
        if !state.policies.contains_key(policy_name) {
            return Err(BridgeError::ResourceNotFound(format!("policy {}", policy_name)));
        }
        let cert = state
            .certificate_by_arn(target)
            .ok_or_else(|| BridgeError::ResourceNotFound(format!("target {}", target)))?;
        cert.policies.remove(policy_name);
        Ok(())
    }

    async fn create_thing(&self, thing_name: &str) -> Result<()> {
        self.record(IssuerOp::CreateThing)?;
        write(&self.state)
            .things
            .entry(thing_name.to_string())
            .or_default();
        Ok(())
    }

    async fn attach_thing_principal(&self, thing_name: &str, principal: &str) -> Result<()> {
        self.record(IssuerOp::AttachThingPrincipal)?;
        let mut state = write(&self.state);
        if state.certificate_by_arn(principal).is_none() {
            return Err(BridgeError::ResourceNotFound(format!("principal {}", principal)));
        }
        let principals = state
            .things
            .get_mut(thing_name)
            .ok_or_else(|| BridgeError::ResourceNotFound(format!("thing {}", thing_name)))?;
        principals.insert(principal.to_string());
        Ok(())
    }

    async fn detach_thing_principal(&self, thing_name: &str, principal: &str) -> Result<()> {
        self.record(IssuerOp::DetachThingPrincipal)?;
        let mut state = write(&self.state);
        if state.certificate_by_arn(principal).is_none() {
            return Err(BridgeError::ResourceNotFound(format!("principal {}", principal)));
        }
        let principals = state
            .things
            .get_mut(thing_name)
            .ok_or_else(|| BridgeError::ResourceNotFound(format!("thing {}", thing_name)))?;
        principals.remove(principal);
        Ok(())
    }

    async fn update_certificate_status(
        &self,
        certificate_id: &str,
        status: CertificateStatus,
    ) -> Result<()> {
        self.record(IssuerOp::UpdateCertificateStatus)?;
        let mut state = write(&self.state);
        let cert = state.certificates.get_mut(certificate_id).ok_or_else(|| {
            BridgeError::ResourceNotFound(format!("certificate {}", certificate_id))
        })?;
        cert.status = status;
        Ok(())
    }

    async fn delete_certificate(&self, certificate_id: &str, force_delete: bool) -> Result<()> {
        self.record(IssuerOp::DeleteCertificate)?;
        let mut state = write(&self.state);
        let cert = state.certificates.get(certificate_id).ok_or_else(|| {
            BridgeError::ResourceNotFound(format!("certificate {}", certificate_id))
        })?;

        if cert.status == CertificateStatus::Active {
            return Err(BridgeError::InvalidRequest(format!(
                "certificate {} is active; deactivate it before deletion",
                certificate_id
            )));
        }

        let arn = cert.arn.clone();
        let bound = state.things.values().any(|p| p.contains(&arn));
        if !force_delete && (bound || !cert.policies.is_empty()) {
            return Err(BridgeError::InvalidRequest(format!(
                "certificate {} is still attached",
                certificate_id
            )));
        }

        for principals in state.things.values_mut() {
            principals.remove(&arn);
        }
        state.certificates.remove(certificate_id);
        Ok(())
    }

    async fn delete_thing(&self, thing_name: &str) -> Result<()> {
        self.record(IssuerOp::DeleteThing)?;
        write(&self.state)
            .things
            .remove(thing_name)
            .map(|_| ())
            .ok_or_else(|| BridgeError::ResourceNotFound(format!("thing {}", thing_name)))
    }

    fn description(&self) -> &str {
        "in-memory certificate issuer"
    }
}

//! Ordered, absent-tolerant teardown of a provisioned device
//!
//! Each step yields a tri-state outcome. The sequence continues over `Done`
//! and `AlreadyAbsent` and stops at the first `Failed`. The credential record
//! is the last step, so it is only deleted once every issuer-side step has
//! completed or been confirmed absent.

use fleet_bridge::{BridgeError, CertificateIssuer, CertificateStatus};
use fleet_core::DeviceCredentialRecord;
use std::fmt;
use tracing::{error, info};

use crate::storage::CredentialStore;

/// One step of the teardown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownStep {
    DetachPolicy,
    DetachPrincipal,
    DeactivateCertificate,
    DeleteCertificate,
    DeleteThing,
    DeleteRecord,
}

impl TeardownStep {
    /// Steps in execution order
    pub const SEQUENCE: [TeardownStep; 6] = [
        TeardownStep::DetachPolicy,
        TeardownStep::DetachPrincipal,
        TeardownStep::DeactivateCertificate,
        TeardownStep::DeleteCertificate,
        TeardownStep::DeleteThing,
        TeardownStep::DeleteRecord,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TeardownStep::DetachPolicy => "detach_policy",
            TeardownStep::DetachPrincipal => "detach_principal",
            TeardownStep::DeactivateCertificate => "deactivate_certificate",
            TeardownStep::DeleteCertificate => "delete_certificate",
            TeardownStep::DeleteThing => "delete_thing",
            TeardownStep::DeleteRecord => "delete_record",
        }
    }
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a single teardown step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// The target was already gone; carries the collaborator's message
    AlreadyAbsent(String),
    Failed(String),
}

impl StepOutcome {
    /// Classify a collaborator result. Only `ResourceNotFound` is tolerated.
    fn from_bridge(result: Result<(), BridgeError>) -> Self {
        match result {
            Ok(()) => StepOutcome::Done,
            Err(e) if e.is_resource_not_found() => StepOutcome::AlreadyAbsent(e.to_string()),
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// Outcomes of the steps that ran, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    steps: Vec<(TeardownStep, StepOutcome)>,
}

impl TeardownReport {
    pub fn steps(&self) -> &[(TeardownStep, StepOutcome)] {
        &self.steps
    }

    /// Outcome of `step`, if it ran
    pub fn outcome(&self, step: TeardownStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    /// The step that aborted the sequence, with its error message
    pub fn failure(&self) -> Option<(TeardownStep, &str)> {
        self.steps.iter().find_map(|(step, outcome)| match outcome {
            StepOutcome::Failed(msg) => Some((*step, msg.as_str())),
            _ => None,
        })
    }

    /// Steps whose target was already gone
    pub fn already_absent(&self) -> Vec<TeardownStep> {
        self.steps
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::AlreadyAbsent(_)))
            .map(|(s, _)| *s)
            .collect()
    }

    /// Whether every step ran without failure
    pub fn is_complete(&self) -> bool {
        self.steps.len() == TeardownStep::SEQUENCE.len() && self.failure().is_none()
    }
}

/// Teardown of one device's issuer resources and credential record
pub struct Teardown<'a> {
    issuer: &'a dyn CertificateIssuer,
    store: &'a dyn CredentialStore,
    policy_name: &'a str,
    record: &'a DeviceCredentialRecord,
}

impl<'a> Teardown<'a> {
    pub fn new(
        issuer: &'a dyn CertificateIssuer,
        store: &'a dyn CredentialStore,
        policy_name: &'a str,
        record: &'a DeviceCredentialRecord,
    ) -> Self {
        Self {
            issuer,
            store,
            policy_name,
            record,
        }
    }

    /// Execute one step
    pub async fn run_step(&self, step: TeardownStep) -> StepOutcome {
        let thing = self.record.device_id.as_str();
        let arn = self.record.certificate_arn.as_str();
        let cert_id = self.record.certificate_id.as_str();

        match step {
            TeardownStep::DetachPolicy => {
                StepOutcome::from_bridge(self.issuer.detach_policy(self.policy_name, arn).await)
            }
            TeardownStep::DetachPrincipal => {
                StepOutcome::from_bridge(self.issuer.detach_thing_principal(thing, arn).await)
            }
            TeardownStep::DeactivateCertificate => StepOutcome::from_bridge(
                self.issuer
                    .update_certificate_status(cert_id, CertificateStatus::Inactive)
                    .await,
            ),
            TeardownStep::DeleteCertificate => {
                StepOutcome::from_bridge(self.issuer.delete_certificate(cert_id, true).await)
            }
            TeardownStep::DeleteThing => {
                StepOutcome::from_bridge(self.issuer.delete_thing(thing).await)
            }
            TeardownStep::DeleteRecord => match self.store.delete(&self.record.device_id).await {
                Ok(true) => StepOutcome::Done,
                Ok(false) => StepOutcome::AlreadyAbsent("credential record already deleted".into()),
                Err(e) => StepOutcome::Failed(e.to_string()),
            },
        }
    }

    /// Run the sequence, stopping at the first failed step
    pub async fn run(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let device_id = &self.record.device_id;

        for step in TeardownStep::SEQUENCE {
            let outcome = self.run_step(step).await;

            match &outcome {
                StepOutcome::Done => {
                    info!(device_id = %device_id, step = %step, "Teardown step done");
                }
                StepOutcome::AlreadyAbsent(msg) => {
                    info!(device_id = %device_id, step = %step, reason = %msg, "Teardown step already absent");
                }
                StepOutcome::Failed(msg) => {
                    error!(device_id = %device_id, step = %step, error = %msg, "Teardown step failed");
                }
            }

            let failed = outcome.is_failed();
            report.steps.push((step, outcome));
            if failed {
                break;
            }
        }

        report
    }
}

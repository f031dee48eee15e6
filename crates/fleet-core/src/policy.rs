//! Access policy granted to every provisioned device certificate
//!
//! A single named policy is shared across the fleet. Connect rights are
//! scoped to the client id matching the connecting thing's name; publish,
//! subscribe and receive are granted on all topics.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Default name of the shared policy
pub const DEFAULT_POLICY_NAME: &str = "IoT_Policy";

const POLICY_VERSION: &str = "2012-10-17";

/// The fleet-wide access policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    name: String,
    document: PolicyDocument,
}

/// Policy document in the issuer's JSON grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

/// One allow/deny statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: String,
    pub action: Vec<String>,
    pub resource: String,
}

impl AccessPolicy {
    /// Build the policy for a region and account
    pub fn new(
        name: impl Into<String>,
        region: &str,
        account_id: &str,
    ) -> Self {
        let arn_prefix = format!("arn:aws:iot:{}:{}", region, account_id);

        let document = PolicyDocument {
            version: POLICY_VERSION.to_string(),
            statement: vec![
                PolicyStatement {
                    effect: "Allow".into(),
                    action: vec!["iot:Connect".into()],
                    resource: format!(
                        "{}:client/${{iot:Connection.Thing.ThingName}}",
                        arn_prefix
                    ),
                },
                PolicyStatement {
                    effect: "Allow".into(),
                    action: vec![
                        "iot:Publish".into(),
                        "iot:Subscribe".into(),
                        "iot:Receive".into(),
                    ],
                    resource: format!("{}:topic/*", arn_prefix),
                },
            ],
        };

        Self {
            name: name.into(),
            document,
        }
    }

    /// Policy name as registered with the issuer
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structured policy document
    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    /// Render the document as the JSON string the issuer stores
    pub fn document_json(&self) -> Result<String> {
        serde_json::to_string(&self.document).map_err(CoreError::from)
    }
}

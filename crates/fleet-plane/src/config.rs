//! Control plane configuration
//!
//! Every field has a default matching the reference deployment and can be
//! overridden through a `FLEET_*` environment variable.

use base64::{engine::general_purpose::STANDARD, Engine};
use fleet_bridge::DEFAULT_ROOT_CA_URL;
use fleet_core::DEFAULT_POLICY_NAME;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Lifetime of a firmware capability URL, in seconds
pub const FIRMWARE_URL_TTL_SECS: u64 = 120;

/// Error raised for malformed configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a valid port number, got '{value}'")]
    InvalidPort { var: &'static str, value: String },

    #[error("{var} must be a base64-encoded 32-byte key")]
    InvalidSigningKey { var: &'static str },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Control plane configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneConfig {
    /// Listen port
    pub port: u16,
    /// Externally reachable base URL, used to build firmware capability URLs
    pub public_url: String,
    /// Name of the shared device access policy
    pub policy_name: String,
    /// Region the policy resources are scoped to
    pub region: String,
    /// Account the policy resources are scoped to
    pub account_id: String,
    /// Where the root CA certificate is downloaded from
    pub root_ca_url: String,
    /// Command topics are `{command_topic_base}/{device_id}`
    pub command_topic_base: String,
    /// Bucket holding the firmware artifact
    pub firmware_bucket: String,
    /// Well-known key of the firmware artifact
    pub firmware_key: String,
    /// Local file used to seed the in-process blob store
    pub firmware_path: Option<PathBuf>,
    /// PostgreSQL connection string; the memory store is used when unset
    pub database_url: Option<String>,
    /// HTTPS publish endpoint of the broker; the memory broker is used when unset
    pub broker_endpoint: Option<String>,
    /// Bearer token for the broker endpoint
    pub broker_token: Option<String>,
    /// Certificate registry endpoint; the in-memory issuer is used when unset
    pub issuer_endpoint: Option<String>,
    /// Bearer token for the registry endpoint
    pub issuer_token: Option<String>,
    /// Ed25519 secret for capability URLs; generated at start when unset
    pub url_signing_key: Option<[u8; 32]>,
    /// Tracing level name
    pub log_level: String,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            public_url: "http://localhost:8080".into(),
            policy_name: DEFAULT_POLICY_NAME.into(),
            region: "ap-southeast-1".into(),
            account_id: "000000000000".into(),
            root_ca_url: DEFAULT_ROOT_CA_URL.into(),
            command_topic_base: "/topic/command".into(),
            firmware_bucket: "esp32-firmware-storage".into(),
            firmware_key: "iot_esp32_ota.bin".into(),
            firmware_path: None,
            database_url: None,
            broker_endpoint: None,
            broker_token: None,
            issuer_endpoint: None,
            issuer_token: None,
            url_signing_key: None,
            log_level: "info".into(),
        }
    }
}

impl PlaneConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("FLEET_PLANE_PORT") {
            config.port = value.parse().map_err(|_| ConfigError::InvalidPort {
                var: "FLEET_PLANE_PORT",
                value,
            })?;
        }

        let text = |var: &'static str, slot: &mut String| -> Result<(), ConfigError> {
            if let Some(value) = lookup(var) {
                if value.trim().is_empty() {
                    return Err(ConfigError::Empty { var });
                }
                *slot = value;
            }
            Ok(())
        };
        text("FLEET_PLANE_PUBLIC_URL", &mut config.public_url)?;
        text("FLEET_POLICY_NAME", &mut config.policy_name)?;
        text("FLEET_REGION", &mut config.region)?;
        text("FLEET_ACCOUNT_ID", &mut config.account_id)?;
        text("FLEET_ROOT_CA_URL", &mut config.root_ca_url)?;
        text("FLEET_COMMAND_TOPIC_BASE", &mut config.command_topic_base)?;
        text("FLEET_FIRMWARE_BUCKET", &mut config.firmware_bucket)?;
        text("FLEET_FIRMWARE_KEY", &mut config.firmware_key)?;
        text("FLEET_PLANE_LOG_LEVEL", &mut config.log_level)?;

        config.firmware_path = lookup("FLEET_FIRMWARE_PATH").map(PathBuf::from);
        config.database_url = lookup("FLEET_DATABASE_URL");
        config.broker_endpoint = lookup("FLEET_BROKER_ENDPOINT");
        config.broker_token = lookup("FLEET_BROKER_TOKEN");
        config.issuer_endpoint = lookup("FLEET_ISSUER_ENDPOINT");
        config.issuer_token = lookup("FLEET_ISSUER_TOKEN");

        if let Some(value) = lookup("FLEET_URL_SIGNING_KEY") {
            config.url_signing_key = Some(decode_signing_key(&value)?);
        }

        Ok(config)
    }

    /// Base URL firmware capability URLs are minted under
    pub fn firmware_endpoint(&self) -> String {
        format!("{}/v1/firmware", self.public_url.trim_end_matches('/'))
    }
}

fn decode_signing_key(value: &str) -> Result<[u8; 32], ConfigError> {
    let err = || ConfigError::InvalidSigningKey {
        var: "FLEET_URL_SIGNING_KEY",
    };
    STANDARD
        .decode(value.trim())
        .map_err(|_| err())?
        .try_into()
        .map_err(|_| err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PlaneConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PlaneConfig::default());
        assert_eq!(config.policy_name, "IoT_Policy");
        assert_eq!(config.command_topic_base, "/topic/command");
        assert_eq!(config.firmware_endpoint(), "http://localhost:8080/v1/firmware");
    }

    #[test]
    fn test_overrides() {
        let key = STANDARD.encode([9u8; 32]);
        let config = PlaneConfig::from_lookup(lookup(&[
            ("FLEET_PLANE_PORT", "9000"),
            ("FLEET_PLANE_PUBLIC_URL", "https://fleet.example.com/"),
            ("FLEET_FIRMWARE_KEY", "v2.bin"),
            ("FLEET_ISSUER_ENDPOINT", "https://iot.example.com"),
            ("FLEET_URL_SIGNING_KEY", key.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.firmware_key, "v2.bin");
        assert_eq!(config.issuer_endpoint.as_deref(), Some("https://iot.example.com"));
        assert_eq!(config.issuer_token, None);
        assert_eq!(config.url_signing_key, Some([9u8; 32]));
        assert_eq!(config.firmware_endpoint(), "https://fleet.example.com/v1/firmware");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            PlaneConfig::from_lookup(lookup(&[("FLEET_PLANE_PORT", "http")])),
            Err(ConfigError::InvalidPort { .. })
        ));
        assert!(matches!(
            PlaneConfig::from_lookup(lookup(&[("FLEET_URL_SIGNING_KEY", "c2hvcnQ=")])),
            Err(ConfigError::InvalidSigningKey { .. })
        ));
        assert!(matches!(
            PlaneConfig::from_lookup(lookup(&[("FLEET_POLICY_NAME", " ")])),
            Err(ConfigError::Empty { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_any_port_and_key_load(port in any::<u16>(), key in any::<[u8; 32]>()) {
            let encoded = STANDARD.encode(key);
            let port_text = port.to_string();
            let config = PlaneConfig::from_lookup(lookup(&[
                ("FLEET_PLANE_PORT", port_text.as_str()),
                ("FLEET_URL_SIGNING_KEY", encoded.as_str()),
            ]))
            .unwrap();

            prop_assert_eq!(config.port, port);
            prop_assert_eq!(config.url_signing_key, Some(key));
        }

        #[test]
        fn prop_non_numeric_port_rejected(value in "[a-z]{1,8}") {
            let result = PlaneConfig::from_lookup(lookup(&[("FLEET_PLANE_PORT", value.as_str())]));
            let rejected = matches!(result, Err(ConfigError::InvalidPort { .. }));
            prop_assert!(rejected);
        }
    }
}

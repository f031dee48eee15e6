//! Time-boxed capability URLs for firmware artifacts
//!
//! A capability URL grants read access to exactly one object until its
//! expiry, without any other authentication. The URL carries the expiry,
//! the signer's key id, and an Ed25519 signature over the canonical string
//!
//! ```text
//! GET\n/{bucket}/{key}\n{expires}
//! ```
//!
//! where `bucket` and `key` are the last two path segments as they appear
//! in the URL, still percent-encoded. A key containing `/` is one encoded
//! segment. [`VerifiedCapability`] carries the decoded names, which are the
//! ones the object was stored under.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use percent_encoding::percent_decode_str;
use rand::rngs::OsRng;
use url::Url;

use crate::error::{CoreError, Result};

/// Query parameter holding the unix expiry timestamp
pub const EXPIRES_PARAM: &str = "X-Fleet-Expires";

/// Query parameter holding the signer's key id
pub const KEY_ID_PARAM: &str = "X-Fleet-Key-Id";

/// Query parameter holding the base64url signature
pub const SIGNATURE_PARAM: &str = "X-Fleet-Signature";

/// A freshly minted capability URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityUrl {
    pub url: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The object a verified capability grants access to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCapability {
    pub bucket: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

/// Ed25519 signer for capability URLs
#[derive(Clone)]
pub struct UrlSigner {
    kid: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("kid", &self.kid)
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl UrlSigner {
    /// Generate a signer with a random key
    pub fn generate(kid: impl Into<String>) -> Self {
        Self::from_signing_key(kid, SigningKey::generate(&mut OsRng))
    }

    /// Create a signer from raw secret key bytes
    pub fn from_bytes(kid: impl Into<String>, bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(kid, SigningKey::from_bytes(bytes))
    }

    fn from_signing_key(kid: impl Into<String>, signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            kid: kid.into(),
            signing_key,
            verifying_key,
        }
    }

    /// Key identifier embedded in minted URLs
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Mint a read capability for `{endpoint}/{bucket}/{key}` valid for `ttl` from `now`
    pub fn mint(
        &self,
        endpoint: &str,
        bucket: &str,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<CapabilityUrl> {
        if ttl <= Duration::zero() {
            return Err(CoreError::CapabilityInvalid("ttl must be positive".into()));
        }

        let mut url = Url::parse(endpoint)?;
        url.path_segments_mut()
            .map_err(|_| CoreError::CapabilityInvalid(format!("endpoint cannot be a base: {}", endpoint)))?
            .pop_if_empty()
            .push(bucket)
            .push(key);
        url.set_query(None);

        let (enc_bucket, enc_key) = resource_segments(&url)?;

        // Whole seconds, matching what the URL can express
        let issued = now.timestamp();
        let expires = issued + ttl.num_seconds();
        let issued_at = DateTime::from_timestamp(issued, 0)
            .ok_or_else(|| CoreError::CapabilityInvalid("issue time out of range".into()))?;
        let expires_at = DateTime::from_timestamp(expires, 0)
            .ok_or_else(|| CoreError::CapabilityInvalid("expiry out of range".into()))?;

        let signature = self
            .signing_key
            .sign(canonical_string(&enc_bucket, &enc_key, expires).as_bytes());

        url.query_pairs_mut()
            .append_pair(EXPIRES_PARAM, &expires.to_string())
            .append_pair(KEY_ID_PARAM, &self.kid)
            .append_pair(SIGNATURE_PARAM, &URL_SAFE_NO_PAD.encode(signature.to_bytes()));

        Ok(CapabilityUrl {
            url: url.into(),
            issued_at,
            expires_at,
        })
    }

    /// Verify a capability URL at `now`
    ///
    /// The signature is checked before the expiry, so a URL whose expiry was
    /// edited reports as invalid rather than expired.
    pub fn verify(&self, capability_url: &str, now: DateTime<Utc>) -> Result<VerifiedCapability> {
        let url = Url::parse(capability_url)?;
        let (bucket, key) = resource_segments(&url)?;

        let mut expires = None;
        let mut kid = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                EXPIRES_PARAM => expires = Some(value.into_owned()),
                KEY_ID_PARAM => kid = Some(value.into_owned()),
                SIGNATURE_PARAM => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let kid = kid.ok_or_else(|| missing(KEY_ID_PARAM))?;
        if kid != self.kid {
            return Err(CoreError::CapabilityInvalid(format!("unknown signer: {}", kid)));
        }

        let expires: i64 = expires
            .ok_or_else(|| missing(EXPIRES_PARAM))?
            .parse()
            .map_err(|_| CoreError::CapabilityInvalid("malformed expiry".into()))?;

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature.ok_or_else(|| missing(SIGNATURE_PARAM))?)
            .map_err(|e| CoreError::CapabilityInvalid(format!("signature encoding: {}", e)))?;
        let sig_bytes: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| CoreError::CapabilityInvalid("signature length".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        self.verifying_key
            .verify(canonical_string(&bucket, &key, expires).as_bytes(), &signature)
            .map_err(|_| CoreError::CapabilityInvalid("signature mismatch".into()))?;

        let expires_at = DateTime::from_timestamp(expires, 0)
            .ok_or_else(|| CoreError::CapabilityInvalid("expiry out of range".into()))?;
        if now > expires_at {
            return Err(CoreError::CapabilityExpired(expires_at.to_rfc3339()));
        }

        Ok(VerifiedCapability {
            bucket: decode_segment(&bucket)?,
            key: decode_segment(&key)?,
            expires_at,
        })
    }
}

fn canonical_string(bucket: &str, key: &str, expires: i64) -> String {
    format!("GET\n/{}/{}\n{}", bucket, key, expires)
}

fn resource_segments(url: &Url) -> Result<(String, String)> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [.., bucket, key] if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket.to_string(), key.to_string()))
        }
        _ => Err(CoreError::CapabilityInvalid(format!(
            "no bucket/key in path: {}",
            url.path()
        ))),
    }
}

fn decode_segment(segment: &str) -> Result<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| CoreError::CapabilityInvalid(format!("path segment is not UTF-8: {}", segment)))
}

fn missing(param: &str) -> CoreError {
    CoreError::CapabilityInvalid(format!("missing {}", param))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "https://plane.example.com/v1/firmware";

    fn signer() -> UrlSigner {
        UrlSigner::from_bytes("test-signer", &[7u8; 32])
    }

    #[test]
    fn test_mint_and_verify() {
        let signer = signer();
        let now = Utc::now();
        let cap = signer
            .mint(ENDPOINT, "fw-bucket", "image.bin", Duration::seconds(120), now)
            .unwrap();

        assert!(cap.url.starts_with("https://plane.example.com/v1/firmware/fw-bucket/image.bin?"));
        assert_eq!(cap.expires_at.timestamp(), now.timestamp() + 120);

        let verified = signer.verify(&cap.url, now).unwrap();
        assert_eq!(verified.bucket, "fw-bucket");
        assert_eq!(verified.key, "image.bin");
    }

    #[test]
    fn test_nested_key_round_trips_decoded() {
        let signer = signer();
        let now = Utc::now();

        for key in ["releases/v2.bin", "nightly build+1.bin"] {
            let cap = signer
                .mint(ENDPOINT, "fw-bucket", key, Duration::seconds(120), now)
                .unwrap();
            assert!(cap.url.starts_with("https://plane.example.com/v1/firmware/fw-bucket/"));

            let verified = signer.verify(&cap.url, now).unwrap();
            assert_eq!(verified.bucket, "fw-bucket");
            assert_eq!(verified.key, key);
        }
    }

    #[test]
    fn test_nested_key_is_one_segment() {
        let cap = signer()
            .mint(ENDPOINT, "fw-bucket", "releases/v2.bin", Duration::seconds(120), Utc::now())
            .unwrap();
        assert!(cap.url.contains("/fw-bucket/releases%2Fv2.bin?"));
    }

    #[test]
    fn test_expired() {
        let signer = signer();
        let now = Utc::now();
        let cap = signer
            .mint(ENDPOINT, "fw-bucket", "image.bin", Duration::seconds(120), now)
            .unwrap();

        let later = cap.expires_at + Duration::seconds(1);
        assert!(matches!(
            signer.verify(&cap.url, later),
            Err(CoreError::CapabilityExpired(_))
        ));
        assert!(signer.verify(&cap.url, cap.expires_at).is_ok());
    }

    #[test]
    fn test_tampered_expiry_is_invalid() {
        let signer = signer();
        let now = Utc::now();
        let cap = signer
            .mint(ENDPOINT, "fw-bucket", "image.bin", Duration::seconds(120), now)
            .unwrap();

        let original = format!("{}={}", EXPIRES_PARAM, cap.expires_at.timestamp());
        let forged = format!("{}={}", EXPIRES_PARAM, cap.expires_at.timestamp() + 3600);
        let tampered = cap.url.replace(&original, &forged);

        assert!(matches!(
            signer.verify(&tampered, now),
            Err(CoreError::CapabilityInvalid(_))
        ));
    }

    #[test]
    fn test_other_object_is_invalid() {
        let signer = signer();
        let now = Utc::now();
        let cap = signer
            .mint(ENDPOINT, "fw-bucket", "image.bin", Duration::seconds(120), now)
            .unwrap();

        let other = cap.url.replace("image.bin", "other.bin");
        assert!(matches!(
            signer.verify(&other, now),
            Err(CoreError::CapabilityInvalid(_))
        ));
    }

    #[test]
    fn test_other_signer_is_invalid() {
        let now = Utc::now();
        let cap = signer()
            .mint(ENDPOINT, "fw-bucket", "image.bin", Duration::seconds(120), now)
            .unwrap();

        let stranger = UrlSigner::generate("test-signer");
        assert!(matches!(
            stranger.verify(&cap.url, now),
            Err(CoreError::CapabilityInvalid(_))
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = signer().mint(ENDPOINT, "b", "k", Duration::zero(), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", signer());
        assert!(debug.contains("[redacted]"));
    }
}

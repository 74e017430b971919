// File: notifier/src/config/secrets.rs
//! VAPID credential store.
//!
//! The key pair is generated once out-of-band with the `vapid-keygen`
//! utility and supplied through the environment:
//!
//! ```text
//! VAPID_PUBLIC_KEY=BExampleUncompressedP256PointInBase64Url...
//! VAPID_PRIVATE_KEY=Base64UrlEncoded32ByteScalar...
//! VAPID_SUBJECT=mailto:ops@example.edu   # optional
//! ```
//!
//! The pair is loaded once at process start, validated, and then passed by
//! reference to the dispatcher. It is never regenerated at runtime and never
//! written anywhere.

use crate::constants::{env, push};
use crate::errors::ConfigError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::EncodingKey;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use std::fmt;
use tracing::info;

/// Immutable, process-wide VAPID key pair
#[derive(Clone)]
pub struct VapidKeys {
    signing_key: SigningKey,
    /// Same key in the form the JWT encoder takes (PKCS#8)
    jwt_key: EncodingKey,
    public_key: String,
    subject: String,
}

impl VapidKeys {
    /// Load the key pair from the process environment
    pub fn load(default_subject: &str) -> Result<Self, ConfigError> {
        Self::load_from(|name| std::env::var(name).ok(), default_subject)
    }

    /// Load the key pair through an arbitrary variable lookup
    pub fn load_from<F>(lookup: F, default_subject: &str) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public = lookup(env::VAPID_PUBLIC_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: env::VAPID_PUBLIC_KEY.to_string(),
            })?;
        let private = lookup(env::VAPID_PRIVATE_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: env::VAPID_PRIVATE_KEY.to_string(),
            })?;
        let subject = lookup(env::VAPID_SUBJECT)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default_subject.to_string());
        super::validate_subject(env::VAPID_SUBJECT, &subject)?;

        let keys = Self::from_base64(public.trim(), private.trim(), &subject)?;
        info!("VAPID key pair loaded (subject {})", keys.subject);
        Ok(keys)
    }

    /// Build the key pair from base64url-encoded material.
    ///
    /// The public key must be a 65-byte uncompressed P-256 point, the private
    /// key a 32-byte scalar, and the public key must belong to the private key.
    pub fn from_base64(public: &str, private: &str, subject: &str) -> Result<Self, ConfigError> {
        let private_bytes = decode_key(env::VAPID_PRIVATE_KEY, private, push::PRIVATE_KEY_LEN)?;
        let public_bytes = decode_key(env::VAPID_PUBLIC_KEY, public, push::PUBLIC_KEY_LEN)?;

        let secret = SecretKey::from_slice(&private_bytes).map_err(|_| {
            ConfigError::InvalidValue {
                field: env::VAPID_PRIVATE_KEY.to_string(),
                reason: "not a valid P-256 scalar".to_string(),
            }
        })?;
        let declared = PublicKey::from_sec1_bytes(&public_bytes).map_err(|_| {
            ConfigError::InvalidValue {
                field: env::VAPID_PUBLIC_KEY.to_string(),
                reason: "not a valid P-256 point".to_string(),
            }
        })?;

        if secret.public_key() != declared {
            return Err(ConfigError::InvalidValue {
                field: env::VAPID_PUBLIC_KEY.to_string(),
                reason: "does not match the private key".to_string(),
            });
        }

        Self::from_secret(&secret, subject)
    }

    /// Generate a fresh key pair, for `vapid-keygen`
    pub fn generate(subject: &str) -> Result<Self, ConfigError> {
        Self::from_secret(&SecretKey::random(&mut OsRng), subject)
    }

    fn from_secret(secret: &SecretKey, subject: &str) -> Result<Self, ConfigError> {
        let der = secret
            .to_pkcs8_der()
            .map_err(|e| ConfigError::InvalidValue {
                field: env::VAPID_PRIVATE_KEY.to_string(),
                reason: format!("cannot encode as PKCS#8: {}", e),
            })?;
        let public = secret.public_key().to_encoded_point(false);

        Ok(Self {
            signing_key: SigningKey::from(secret),
            jwt_key: EncodingKey::from_ec_der(der.as_bytes()),
            public_key: URL_SAFE_NO_PAD.encode(public.as_bytes()),
            subject: subject.to_string(),
        })
    }

    /// Application server key as handed to browsers (`applicationServerKey`)
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Private scalar, base64url. Only for exporting freshly generated keys.
    pub fn export_private_key(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.signing_key.to_bytes())
    }

    pub(crate) fn jwt_key(&self) -> &EncodingKey {
        &self.jwt_key
    }

    #[cfg(test)]
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key)
            .field("subject", &self.subject)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn decode_key(field: &str, value: &str, expected_len: usize) -> Result<Vec<u8>, ConfigError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("not base64url: {}", e),
        })?;

    if bytes.len() != expected_len {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected {} bytes, got {}", expected_len, bytes.len()),
        });
    }

    Ok(bytes)
}

//! Message encryption for Web Push (RFC 8291, `aes128gcm` content coding).
//!
//! Each message gets a fresh ephemeral P-256 key and a random salt, so the
//! same payload never encrypts to the same body twice. Payloads are sent as a
//! single record.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::constants::push::{AUTH_SECRET_LEN, PUBLIC_KEY_LEN, RECORD_SIZE};

const SALT_LEN: usize = 16;
const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;
const TAG_LEN: usize = 16;

/// Largest plaintext that fits a single record
pub const MAX_PLAINTEXT_LEN: usize = RECORD_SIZE as usize - HEADER_LEN - TAG_LEN - 1;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("subscription key '{field}' is invalid: {reason}")]
    InvalidClientKey { field: &'static str, reason: String },

    #[error("payload of {0} bytes exceeds the single-record limit")]
    PayloadTooLarge(usize),

    #[error("encryption failed: {0}")]
    Cipher(String),
}

/// Encrypt `plaintext` for the browser identified by `p256dh` / `auth`
/// (both base64url, as delivered in the subscription JSON).
pub fn encrypt(p256dh: &str, auth: &str, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(EncryptionError::PayloadTooLarge(plaintext.len()));
    }

    let ua_public = decode_client_key("p256dh", p256dh, PUBLIC_KEY_LEN)?;
    let auth_secret = decode_client_key("auth", auth, AUTH_SECRET_LEN)?;
    let ua_key = PublicKey::from_sec1_bytes(&ua_public).map_err(|_| {
        EncryptionError::InvalidClientKey {
            field: "p256dh",
            reason: "not a P-256 point".to_string(),
        }
    })?;

    let as_secret = EphemeralSecret::random(&mut OsRng);
    let as_public = as_secret.public_key().to_encoded_point(false);
    let shared = as_secret.diffie_hellman(&ua_key);

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    seal(
        &ua_public,
        &auth_secret,
        as_public.as_bytes(),
        shared.raw_secret_bytes().as_slice(),
        &salt,
        plaintext,
    )
}

/// Check browser-supplied keys at registration time, so a bad subscription
/// is refused up front instead of failing every delivery
pub fn validate_client_keys(p256dh: &str, auth: &str) -> Result<(), EncryptionError> {
    let ua_public = decode_client_key("p256dh", p256dh, PUBLIC_KEY_LEN)?;
    decode_client_key("auth", auth, AUTH_SECRET_LEN)?;
    PublicKey::from_sec1_bytes(&ua_public).map_err(|_| EncryptionError::InvalidClientKey {
        field: "p256dh",
        reason: "not a P-256 point".to_string(),
    })?;
    Ok(())
}

/// Key derivation and record framing, given the ECDH result
fn seal(
    ua_public: &[u8],
    auth_secret: &[u8],
    as_public: &[u8],
    shared_secret: &[u8],
    salt: &[u8; SALT_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let (cek, nonce) = derive_keys(ua_public, auth_secret, as_public, shared_secret, salt)?;

    let mut padded = Vec::with_capacity(plaintext.len() + 1);
    padded.extend_from_slice(plaintext);
    // last-record delimiter
    padded.push(0x02);

    let cipher = Aes128Gcm::new_from_slice(&cek)
        .map_err(|e| EncryptionError::Cipher(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), padded.as_slice())
        .map_err(|e| EncryptionError::Cipher(e.to_string()))?;

    let mut body = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    body.extend_from_slice(salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(as_public.len() as u8);
    body.extend_from_slice(as_public);
    body.extend_from_slice(&ciphertext);
    Ok(body)
}

fn derive_keys(
    ua_public: &[u8],
    auth_secret: &[u8],
    as_public: &[u8],
    shared_secret: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12]), EncryptionError> {
    let expand_err = |e: hkdf::InvalidLength| EncryptionError::Cipher(e.to_string());

    let mut key_info = Vec::with_capacity(14 + ua_public.len() + as_public.len());
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(as_public);

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), shared_secret)
        .expand(&key_info, &mut ikm)
        .map_err(expand_err)?;

    let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; 16];
    prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .map_err(expand_err)?;
    let mut nonce = [0u8; 12];
    prk.expand(b"Content-Encoding: nonce\0", &mut nonce)
        .map_err(expand_err)?;

    Ok((cek, nonce))
}

fn decode_client_key(
    field: &'static str,
    value: &str,
    expected_len: usize,
) -> Result<Vec<u8>, EncryptionError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| EncryptionError::InvalidClientKey {
            field,
            reason: e.to_string(),
        })?;
    if bytes.len() != expected_len {
        return Err(EncryptionError::InvalidClientKey {
            field,
            reason: format!("expected {} bytes, got {}", expected_len, bytes.len()),
        });
    }
    Ok(bytes)
}

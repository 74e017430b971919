//! VAPID request signing (RFC 8292)

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde::Serialize;
use url::Url;

use crate::config::VapidKeys;
use crate::constants::push::JWT_EXPIRY_HOURS;
use crate::errors::DeliveryError;

#[derive(Serialize)]
struct Claims<'a> {
    aud: String,
    exp: i64,
    sub: &'a str,
}

/// `Authorization` header value for a request to `endpoint`
pub fn authorization_header(
    keys: &VapidKeys,
    endpoint: &str,
    now: DateTime<Utc>,
) -> Result<String, DeliveryError> {
    let token = sign_token(keys, endpoint, now)?;
    Ok(format!("vapid t={}, k={}", token, keys.public_key()))
}

/// ES256 JWT whose audience is the origin of the push endpoint
pub fn sign_token(
    keys: &VapidKeys,
    endpoint: &str,
    now: DateTime<Utc>,
) -> Result<String, DeliveryError> {
    let url = Url::parse(endpoint)
        .map_err(|e| DeliveryError::permanent(None, format!("invalid endpoint URL: {}", e)))?;
    if !url.has_host() {
        return Err(DeliveryError::permanent(None, "endpoint URL has no host"));
    }

    let claims = Claims {
        aud: url.origin().ascii_serialization(),
        exp: (now + Duration::hours(JWT_EXPIRY_HOURS)).timestamp(),
        sub: keys.subject(),
    };
    encode(&Header::new(Algorithm::ES256), &claims, keys.jwt_key())
        .map_err(|e| DeliveryError::rejected(None, format!("cannot sign VAPID token: {}", e)))
}

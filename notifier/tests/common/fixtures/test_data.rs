//! Common test data and constants

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use notifier::VapidKeys;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand::rngs::OsRng;

/// Fixed "T" every scenario is anchored on
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

pub fn test_keys() -> VapidKeys {
    VapidKeys::generate("mailto:ops@example.edu").expect("Failed to generate VAPID keys")
}

/// Browser-side subscription keys (`p256dh`, `auth`), base64url
pub fn browser_keys() -> (String, String) {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key().to_encoded_point(false);
    (
        URL_SAFE_NO_PAD.encode(public.as_bytes()),
        URL_SAFE_NO_PAD.encode([5u8; 16]),
    )
}

/// Common student ids
pub mod students {
    pub const ALICE: &str = "student-alice";
    pub const BOB: &str = "student-bob";
    pub const CAROL: &str = "student-carol";
}

/// Common push endpoints
pub mod endpoints {
    pub const ALICE_PHONE: &str = "https://push.example/alice-phone";
    pub const ALICE_LAPTOP: &str = "https://push.example/alice-laptop";
    pub const BOB_PHONE: &str = "https://push.example/bob-phone";
    pub const CAROL_PHONE: &str = "https://push.example/carol-phone";
}

pub mod courses {
    pub const MATH: &str = "MATH101";
    pub const PHYS: &str = "PHYS201";
}

//! Webhook signature verification.
//!
//! LINE signs every webhook delivery with HMAC-SHA256 over the raw request
//! body, keyed with the channel secret, and sends the base64-encoded digest
//! in the `x-line-signature` header. Verification therefore has to run on
//! the captured bytes exactly as received; decoding and re-serializing the
//! JSON first would change the byte layout and break the digest.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the `x-line-signature` header against the raw request body.
/// Returns `false` for absent, empty or undecodable signatures; never
/// panics and never errors. The digest comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(sig) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };

    let Ok(expected) = BASE64.decode(sig) else {
        return false;
    };

    // HMAC accepts keys of any length; new_from_slice only fails for
    // variable-output MACs, so this branch is unreachable for SHA-256.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
}

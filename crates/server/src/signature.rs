//! HMAC signatures and constant-time comparisons for inbound webhooks.
//!
//! Both webhook providers sign the raw request body with HMAC-SHA256 and send
//! the hex digest in a header. WhatsApp prefixes it with `sha256=`, the payment
//! gateway sends the bare digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix used by Meta in `X-Hub-Signature-256`.
pub const WHATSAPP_SIGNATURE_PREFIX: &str = "sha256=";

fn keyed(secret: &[u8], body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(mac)
}

/// Hex HMAC-SHA256 of `body` keyed by `secret`, as a provider would send it.
///
/// `None` only if the key is rejected by the MAC implementation.
#[must_use]
pub fn hmac_sha256_hex(secret: &[u8], body: &[u8]) -> Option<String> {
    keyed(secret, body).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Verify a bare hex HMAC-SHA256 signature over `body`.
///
/// The digest is compared in constant time. Anything that is not exactly
/// 32 bytes of hex is rejected.
#[must_use]
pub fn verify_hex_signature(secret: &[u8], body: &[u8], provided: &str) -> bool {
    let Ok(provided) = hex::decode(provided.trim()) else {
        return false;
    };
    keyed(secret, body).is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}

/// Verify an `X-Hub-Signature-256` header value (`sha256=<hex>`).
#[must_use]
pub fn verify_whatsapp_signature(app_secret: &[u8], body: &[u8], header: &str) -> bool {
    header
        .trim()
        .strip_prefix(WHATSAPP_SIGNATURE_PREFIX)
        .is_some_and(|hex_sig| verify_hex_signature(app_secret, body, hex_sig))
}

/// Compare two strings without short-circuiting on the first difference.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2
        let digest = hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            digest,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_hex_signature() {
        let body = br#"{"event":"payment_link.paid"}"#;
        let sig = hmac_sha256_hex(b"gateway", body).unwrap();
        assert!(verify_hex_signature(b"gateway", body, &sig));
        assert!(verify_hex_signature(b"gateway", body, &sig.to_uppercase()));
        assert!(verify_hex_signature(b"gateway", body, &format!(" {sig}\n")));
        assert!(!verify_hex_signature(b"other", body, &sig));
        assert!(!verify_hex_signature(b"gateway", b"tampered", &sig));
    }

    #[test]
    fn test_malformed_hex_signature_is_rejected() {
        let body = br#"{"event":"payment_link.paid"}"#;
        let sig = hmac_sha256_hex(b"gateway", body).unwrap();
        assert!(!verify_hex_signature(b"gateway", body, ""));
        assert!(!verify_hex_signature(b"gateway", body, &sig[..63]));
        assert!(!verify_hex_signature(b"gateway", body, &sig[..62]));
        assert!(!verify_hex_signature(b"gateway", body, &format!("{sig}00")));
        assert!(!verify_hex_signature(b"gateway", body, &format!("zz{}", &sig[2..])));
    }

    #[test]
    fn test_verify_whatsapp_signature_requires_prefix() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let sig = hmac_sha256_hex(b"app", body).unwrap();
        assert!(verify_whatsapp_signature(b"app", body, &format!("sha256={sig}")));
        assert!(!verify_whatsapp_signature(b"app", body, &sig));
        assert!(!verify_whatsapp_signature(b"app", body, "sha256="));
    }
}

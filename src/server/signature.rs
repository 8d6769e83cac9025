//! Webhook signature verification using HMAC-SHA256.
//!
//! Hook sources that support payload signing send `X-Hub-Signature-256` as
//! `sha256=<hex>` over the raw body. When a shared secret is configured,
//! verification runs before any parsing; invalid signatures are rejected
//! outright.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parses a signature header (e.g. "sha256=abc123...") into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex).
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 signature of a payload using the given secret.
///
/// Useful for tests (generating expected signatures).
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a header value: "sha256=<hex>".
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a webhook signature against the payload and secret.
///
/// Constant-time comparison via the MAC's own verification.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(signature) = parse_signature_header(signature_header) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_verifies() {
        let payload = b"{\"before\":\"abc\"}";
        let secret = b"hook-secret";

        let sig = compute_signature(payload, secret);
        let header = format_signature_header(&sig);

        assert!(verify_signature(payload, &header, secret));
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = b"payload";
        let sig = compute_signature(payload, b"right");
        let header = format_signature_header(&sig);

        assert!(!verify_signature(payload, &header, b"wrong"));
    }

    #[test]
    fn tampered_payload_fails() {
        let sig = compute_signature(b"original", b"secret");
        let header = format_signature_header(&sig);

        assert!(!verify_signature(b"tampered", &header, b"secret"));
    }

    #[test]
    fn malformed_headers_fail_closed() {
        assert!(!verify_signature(b"x", "abcd1234", b"secret"));
        assert!(!verify_signature(b"x", "sha1=abcd1234", b"secret"));
        assert!(!verify_signature(b"x", "sha256=not-hex", b"secret"));
        assert!(!verify_signature(b"x", "", b"secret"));
    }
}

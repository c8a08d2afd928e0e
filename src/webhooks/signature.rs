//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs webhook payloads using HMAC-SHA256 with a shared secret.
//! The signature is provided in the `X-Hub-Signature-256` header as `sha256=<hex>`.
//!
//! Verification is the first step in webhook processing and works on the raw
//! request bytes. Parsing and re-encoding the JSON first can change the bytes
//! and break verification, and it would let unsigned requests trigger parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parses a GitHub signature header (e.g., "sha256=abc123...") into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex, etc.).
/// Never panics.
///
/// # Examples
///
/// ```
/// use issue_relay::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("sha256=abcd1234").is_some());
/// assert!(parse_signature_header("abcd1234").is_none());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 signature of a payload using the given secret.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a GitHub-style header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Signs a payload and returns the header value GitHub would send with it.
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    format_signature_header(&compute_signature(payload, secret))
}

/// Verifies a GitHub webhook signature against the payload and secret.
///
/// Returns `true` only if the header is well formed and matches. The digest
/// comparison is constant-time.
///
/// # Examples
///
/// ```
/// use issue_relay::webhooks::{sign, verify_signature};
///
/// let payload = b"Hello, World!";
/// let header = sign(payload, b"It's a Secret to Everybody");
///
/// assert!(verify_signature(payload, &header, b"It's a Secret to Everybody"));
/// assert!(!verify_signature(payload, &header, b"wrong-secret"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let expected_signature = match parse_signature_header(signature_header) {
        Some(sig) => sig,
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&expected_signature).is_ok()
}

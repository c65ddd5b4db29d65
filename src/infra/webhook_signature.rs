use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed skew between the signed timestamp and now, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureRejection {
    #[error("missing timestamp in signature header")]
    MissingTimestamp,
    #[error("missing signature in signature header")]
    MissingSignature,
    #[error("invalid timestamp in signature header")]
    InvalidTimestamp,
    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a Stripe-style webhook signature header against the raw body.
///
/// The header carries comma-separated `t=<unix ts>` and one or more
/// `v1=<hex hmac>` pairs. The HMAC is SHA-256 over `"{t}.{body}"`.
/// A signature only counts as valid if it matches AND its timestamp is
/// within `SIGNATURE_TOLERANCE_SECS` of `now`.
pub fn verify_webhook_signature(
    payload: &str,
    signature_header: &str,
    webhook_secret: &str,
    now: i64,
) -> Result<(), SignatureRejection> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0].trim() {
            "t" => timestamp = Some(kv[1]),
            "v1" => signatures.push(kv[1]),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureRejection::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureRejection::MissingSignature);
    }

    let signed_payload = format!("{}.{}", timestamp, payload);
    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| SignatureRejection::Mismatch)?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    for sig in signatures {
        if constant_time_compare(sig, &expected) {
            let ts: i64 = timestamp
                .parse()
                .map_err(|_| SignatureRejection::InvalidTimestamp)?;
            if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
                return Err(SignatureRejection::TimestampOutOfTolerance);
            }
            return Ok(());
        }
    }

    Err(SignatureRejection::Mismatch)
}

/// Produce a signature header for an outbound or test payload, in the
/// same `t=...,v1=...` format `verify_webhook_signature` accepts.
pub fn sign_webhook_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let signed_content = format!("{}.{}", timestamp, body);
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_content.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tourbook_core::payment::PaymentError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn mac(secret: &str) -> Result<HmacSha256, PaymentError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured("webhook secret".to_string()))
}

/// Hex HMAC-SHA256 of `payload`.
pub fn sign_hex(payload: &[u8], secret: &str) -> Result<String, PaymentError> {
    let mut mac = mac(secret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Value for a `Stripe-Signature` header: `t=<timestamp>,v1=<hex>`.
pub fn sign_stripe(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, PaymentError> {
    let mut mac = mac(secret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time check of a hex HMAC-SHA256 over `payload`.
pub fn verify_hex(payload: &[u8], signature: &str, secret: &str) -> Result<(), PaymentError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(PaymentError::InvalidSignature("missing signature".to_string()));
    }
    let expected = hex::decode(signature)
        .map_err(|_| PaymentError::InvalidSignature("signature is not hex".to_string()))?;

    let mut mac = mac(secret)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature("signature mismatch".to_string()))
}

/// Verifies a `t=...,v1=...` header. Any one matching `v1` entry is enough;
/// the timestamp must be within `tolerance_secs` of `now`.
pub fn verify_stripe(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".to_string()));
    }
    if now.abs_diff(timestamp) > tolerance_secs.max(0) as u64 {
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance".to_string()));
    }

    let mut signed = Vec::with_capacity(payload.len() + 12);
    signed.extend_from_slice(timestamp.to_string().as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);

    for candidate in candidates {
        if verify_hex(&signed, candidate, secret).is_ok() {
            return Ok(());
        }
    }
    Err(PaymentError::InvalidSignature("signature mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    #[test]
    fn test_stripe_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_stripe(payload, SECRET, 1_700_000_000).unwrap();
        assert!(verify_stripe(payload, &header, SECRET, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_stripe_rejects_wrong_secret_and_modified_payload() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_stripe(payload, "wrong_secret", 1_700_000_000).unwrap();
        assert!(verify_stripe(payload, &header, SECRET, 300, 1_700_000_000).is_err());

        let header = sign_stripe(payload, SECRET, 1_700_000_000).unwrap();
        assert!(verify_stripe(br#"{"id":"evt_2"}"#, &header, SECRET, 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_stripe_rejects_stale_timestamp() {
        let payload = b"{}";
        let header = sign_stripe(payload, SECRET, 1_700_000_000).unwrap();
        let result = verify_stripe(payload, &header, SECRET, 300, 1_700_000_301);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_stripe_rejects_extreme_timestamps() {
        let payload = b"{}";
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1=00", t);
            let result = verify_stripe(payload, &header, SECRET, 300, 1_700_000_000);
            assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
        }
    }

    #[test]
    fn test_stripe_malformed_headers() {
        let payload = b"{}";
        assert!(verify_stripe(payload, "v1=abcd", SECRET, 300, 0).is_err());
        assert!(verify_stripe(payload, "t=1234567890", SECRET, 300, 1_234_567_890).is_err());
        assert!(verify_stripe(payload, "garbage", SECRET, 300, 0).is_err());
        assert!(verify_stripe(payload, "", SECRET, 300, 0).is_err());
    }

    #[test]
    fn test_hex_signature() {
        let payload = br#"{"event_type":"PAYMENT.SALE.COMPLETED"}"#;
        let signature = sign_hex(payload, SECRET).unwrap();

        assert!(verify_hex(payload, &signature, SECRET).is_ok());
        assert!(verify_hex(payload, &signature, "other").is_err());
        assert!(verify_hex(payload, "", SECRET).is_err());
        assert!(verify_hex(payload, "zz", SECRET).is_err());
    }
}

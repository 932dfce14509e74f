use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Header value for `body`: `sha256=<hex hmac>`.
pub fn sign_payload(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(body);
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Checks a signature header against `body` in constant time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> AppResult<()> {
    let hex_sig = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(AppError::InvalidSignature)?;
    let expected = hex::decode(hex_sig).map_err(|_| AppError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

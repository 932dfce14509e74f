//! Payment-reference tokens handed to the gateway and echoed back on payment.
//!
//! Layout: `sub:{user_id}:{plan_type}:{millis}:{nonce}`. The nonce only keeps
//! two purchases of the same plan in the same millisecond apart; tokens carry
//! no authenticity guarantee.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::RngCore;
use thiserror::Error;

use super::entities::user::UserId;

pub const TOKEN_DELIMITER: char = ':';
const TOKEN_PREFIX: &str = "sub";
const NONCE_BYTES: usize = 4;

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token does not start with the subscription prefix")]
    WrongPrefix,

    #[error("Token has {0} fields, expected 5")]
    MissingFields(usize),

    #[error("Token user id is not a valid id")]
    BadUserId,

    #[error("Token plan type is empty")]
    EmptyPlanType,

    #[error("Token timestamp is not a number")]
    BadTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceToken {
    pub user_id: UserId,
    pub plan_type: String,
    pub timestamp_millis: i64,
    pub nonce: String,
}

pub fn encode(user_id: UserId, plan_type: &str) -> String {
    let millis = next_millis();
    let nonce = generate_nonce();
    let d = TOKEN_DELIMITER;
    format!("{TOKEN_PREFIX}{d}{user_id}{d}{plan_type}{d}{millis}{d}{nonce}")
}

pub fn decode(token: &str) -> Result<InvoiceToken, TokenError> {
    let parts: Vec<&str> = token.split(TOKEN_DELIMITER).collect();
    if parts.len() < 5 {
        return Err(TokenError::MissingFields(parts.len()));
    }
    if parts[0] != TOKEN_PREFIX {
        return Err(TokenError::WrongPrefix);
    }

    let user_id: UserId = parts[1].parse().map_err(|_| TokenError::BadUserId)?;
    let plan_type = parts[2];
    if plan_type.is_empty() {
        return Err(TokenError::EmptyPlanType);
    }
    let timestamp_millis: i64 = parts[3].parse().map_err(|_| TokenError::BadTimestamp)?;

    Ok(InvoiceToken {
        user_id,
        plan_type: plan_type.to_string(),
        timestamp_millis,
        nonce: parts[4..].join(&TOKEN_DELIMITER.to_string()),
    })
}

/// Wall-clock millis, bumped past the last value handed out in this process.
fn next_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let prev = LAST_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .unwrap_or(now);
    if now > prev { now } else { prev + 1 }
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical account identifier (the bot platform's numeric user id).
///
/// Every component boundary takes a `UserId`. Raw strings are parsed once at
/// the HTTP edge through `FromStr`; nothing below that compares ids as text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(UserId)
            .ok_or_else(|| format!("Invalid user id: {}", s))
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id)
    }
}

/// Entitlement fields mirrored onto the user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntitlement {
    pub user_id: UserId,
    pub is_premium: bool,
    pub plan_type: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The only fields of a user row the subscription store may write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementUpdate {
    pub is_premium: bool,
    pub plan_type: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntitlementUpdate {
    pub fn premium(plan_type: &str, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            is_premium: true,
            plan_type: Some(plan_type.to_string()),
            expires_at,
        }
    }

    pub fn revoked() -> Self {
        Self {
            is_premium: false,
            plan_type: None,
            expires_at: None,
        }
    }
}

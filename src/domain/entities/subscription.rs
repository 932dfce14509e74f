use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: UserId,
    pub plan_type: String,
    pub plan_name: String,
    pub price_units: i64,
    pub started_at: DateTime<Utc>,
    /// `None` for a non-expiring plan.
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub trial: bool,
    pub payment_reference: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Active but already past its expiry.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Whole days left, rounding a partial day up. `None` for lifetime grants.
    pub fn days_left(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|expires_at| {
            let secs = (expires_at - now).num_seconds();
            if secs <= 0 { 0 } else { (secs + 86_399) / 86_400 }
        })
    }
}

/// What happened to a subscription, as recorded in its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionAction {
    Activated,
    Superseded,
    Granted,
    Cancelled,
    Expired,
}

impl SubscriptionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionAction::Activated => "activated",
            SubscriptionAction::Superseded => "superseded",
            SubscriptionAction::Granted => "granted",
            SubscriptionAction::Cancelled => "cancelled",
            SubscriptionAction::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionHistoryEntry {
    /// Insertion order; ties on `created_at` are common within one transaction.
    pub id: i64,
    pub user_id: UserId,
    pub subscription_id: Uuid,
    pub action: SubscriptionAction,
    pub plan_type: String,
    pub created_at: DateTime<Utc>,
}

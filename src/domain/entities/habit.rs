use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Why a habit was locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "habit_lock_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    SubscriptionExpired,
    SubscriptionCancelled,
}

impl LockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockReason::SubscriptionExpired => "subscription_expired",
            LockReason::SubscriptionCancelled => "subscription_cancelled",
        }
    }
}

impl std::fmt::Display for LockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lock-related view of a habit. The habit subsystem owns every other column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitLockState {
    pub id: Uuid,
    pub owner_id: UserId,
    pub is_active: bool,
    pub is_premium_tier: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_reason: Option<LockReason>,
    pub created_at: DateTime<Utc>,
}

impl HabitLockState {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn apply(&mut self, update: HabitLockUpdate) {
        self.locked_at = update.locked_at;
        self.locked_reason = update.locked_reason;
    }
}

/// The only habit fields the lock propagator may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitLockUpdate {
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_reason: Option<LockReason>,
}

impl HabitLockUpdate {
    pub fn lock(now: DateTime<Utc>, reason: LockReason) -> Self {
        Self {
            locked_at: Some(now),
            locked_reason: Some(reason),
        }
    }

    pub fn unlock() -> Self {
        Self {
            locked_at: None,
            locked_reason: None,
        }
    }
}

/// Picks the habits to lock for a non-premium owner.
///
/// The oldest `quota` active habits are grandfathered; of the rest, only
/// premium-tier habits that are not locked yet are returned.
pub fn select_habits_to_lock(habits: &[HabitLockState], quota: usize) -> Vec<Uuid> {
    let mut active: Vec<&HabitLockState> = habits.iter().filter(|h| h.is_active).collect();
    active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    active
        .into_iter()
        .skip(quota)
        .filter(|h| h.is_premium_tier && !h.is_locked())
        .map(|h| h.id)
        .collect()
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{
        habit::{HabitLockState, LockReason},
        user::UserId,
    },
};

// ============================================================================
// Repository Trait
// ============================================================================

/// Lock-state access to the habit subsystem's rows.
///
/// Every mutating method runs in one transaction that first locks the owner's
/// user row, so a concurrent entitlement change cannot interleave.
#[async_trait]
pub trait HabitLockRepo: Send + Sync {
    /// Locks premium-tier habits beyond the oldest `quota` active ones.
    /// Does nothing when the owner is premium. Returns the newly locked ids.
    async fn lock_over_quota(
        &self,
        user_id: UserId,
        quota: usize,
        reason: LockReason,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>>;

    /// Unlocks every locked habit of a premium owner. Does nothing once the
    /// owner has lost premium, so a late grant hook cannot undo a re-lock.
    async fn unlock_all(&self, user_id: UserId) -> AppResult<u64>;

    /// Flags `habit_id` premium-tier when the owner is premium and has more
    /// than `quota` active habits.
    async fn mark_premium_tier_if_over_quota(
        &self,
        user_id: UserId,
        habit_id: Uuid,
        quota: usize,
    ) -> AppResult<bool>;

    async fn list_locked(&self, user_id: UserId) -> AppResult<Vec<HabitLockState>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct HabitLockUseCases {
    repo: Arc<dyn HabitLockRepo>,
    free_quota: usize,
}

impl HabitLockUseCases {
    pub fn new(repo: Arc<dyn HabitLockRepo>, free_quota: usize) -> Self {
        Self { repo, free_quota }
    }

    pub fn free_quota(&self) -> usize {
        self.free_quota
    }

    #[instrument(skip(self))]
    pub async fn lock_over_quota(&self, user_id: UserId, reason: LockReason) -> AppResult<Vec<Uuid>> {
        let locked = self
            .repo
            .lock_over_quota(user_id, self.free_quota, reason, Utc::now())
            .await?;
        if !locked.is_empty() {
            tracing::info!(user_id = %user_id, count = locked.len(), reason = %reason, "Locked over-quota habits");
        }
        Ok(locked)
    }

    #[instrument(skip(self))]
    pub async fn unlock_all(&self, user_id: UserId) -> AppResult<u64> {
        let count = self.repo.unlock_all(user_id).await?;
        if count > 0 {
            tracing::info!(user_id = %user_id, count, "Unlocked habits");
        }
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn mark_if_over_quota(&self, user_id: UserId, habit_id: Uuid) -> AppResult<bool> {
        self.repo
            .mark_premium_tier_if_over_quota(user_id, habit_id, self.free_quota)
            .await
    }

    pub async fn on_entitlement_granted(&self, user_id: UserId) -> AppResult<u64> {
        self.unlock_all(user_id).await
    }

    pub async fn on_entitlement_revoked(
        &self,
        user_id: UserId,
        reason: LockReason,
    ) -> AppResult<Vec<Uuid>> {
        self.lock_over_quota(user_id, reason).await
    }

    pub async fn on_habit_created(&self, user_id: UserId, habit_id: Uuid) -> AppResult<bool> {
        self.mark_if_over_quota(user_id, habit_id).await
    }

    pub async fn locked_habits(&self, user_id: UserId) -> AppResult<Vec<HabitLockState>> {
        self.repo.list_locked(user_id).await
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::notifier::{Notification, Notifier},
        use_cases::{expiration::ExpirationUseCases, habit_lock::HabitLockUseCases},
    },
    domain::{
        entities::{
            habit::LockReason,
            plan::Plan,
            subscription::{Subscription, SubscriptionAction, SubscriptionHistoryEntry},
            user::{UserEntitlement, UserId},
        },
        plan_catalog::PlanCatalog,
    },
};

// ============================================================================
// Profile Types
// ============================================================================

/// Everything needed to write a new active subscription row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationInput {
    pub user_id: UserId,
    pub plan_type: String,
    pub plan_name: String,
    pub price_units: i64,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial: bool,
    pub payment_reference: Option<String>,
    /// `Activated` for paid grants, `Granted` for admin grants.
    pub action: SubscriptionAction,
}

impl ActivationInput {
    pub fn for_plan(user_id: UserId, plan: &Plan, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan_type: plan.plan_type.clone(),
            plan_name: plan.name.clone(),
            price_units: plan.price_units,
            started_at: now,
            expires_at: plan.expires_at_from(now),
            trial: false,
            payment_reference: None,
            action: SubscriptionAction::Activated,
        }
    }
}

/// Result of expiring one subscription row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpireOutcome {
    pub subscription: Subscription,
    /// This call flipped the row to inactive.
    pub deactivated: bool,
    /// The owner has no active subscription left and lost premium.
    pub downgraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled(Subscription),
    NoActiveSubscription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatus {
    pub active: bool,
    pub plan_type: Option<String>,
    pub plan_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_left: Option<i64>,
}

impl SubscriptionStatus {
    fn inactive() -> Self {
        Self {
            active: false,
            plan_type: None,
            plan_name: None,
            expires_at: None,
            days_left: None,
        }
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Subscription rows, their history, and the entitlement mirror on `users`.
///
/// Mutating methods are single transactions that lock the owner's user row
/// first and keep the mirror in step with the active row.
#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// Supersedes any active row, inserts the new one, updates the mirror,
    /// and appends history.
    async fn activate(&self, input: &ActivationInput) -> AppResult<Subscription>;

    /// Deactivates the active row and clears the mirror. `None` when the user
    /// had nothing active.
    async fn cancel_active(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<Option<Subscription>>;

    async fn get_active(&self, user_id: UserId) -> AppResult<Option<Subscription>>;

    /// Active rows with `expires_at < now`. Non-expiring rows never match.
    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;

    /// Expires one row if it is still active and overdue. The `expired`
    /// history row is written at most once. `None` if the row does not exist.
    async fn expire(&self, subscription_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<ExpireOutcome>>;

    /// Newest first.
    async fn list_history(&self, user_id: UserId) -> AppResult<Vec<SubscriptionHistoryEntry>>;

    async fn get_entitlement(&self, user_id: UserId) -> AppResult<Option<UserEntitlement>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    catalog: Arc<PlanCatalog>,
    habit_locks: Arc<HabitLockUseCases>,
    expiration: Arc<ExpirationUseCases>,
    notifier: Arc<dyn Notifier>,
}

impl SubscriptionUseCases {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        catalog: Arc<PlanCatalog>,
        habit_locks: Arc<HabitLockUseCases>,
        expiration: Arc<ExpirationUseCases>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            catalog,
            habit_locks,
            expiration,
            notifier,
        }
    }

    fn plan(&self, plan_type: &str) -> AppResult<&Plan> {
        self.catalog
            .get(plan_type)
            .ok_or_else(|| AppError::InvalidPlan(plan_type.to_string()))
    }

    /// Makes `plan_type` the user's active subscription, superseding any
    /// previous one.
    #[instrument(skip(self))]
    pub async fn activate(
        &self,
        user_id: UserId,
        plan_type: &str,
        payment_reference: Option<String>,
    ) -> AppResult<Subscription> {
        let plan = self.plan(plan_type)?;
        let mut input = ActivationInput::for_plan(user_id, plan, Utc::now());
        input.payment_reference = payment_reference;

        let subscription = self.repo.activate(&input).await?;
        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription.id,
            plan_type = %subscription.plan_type,
            "Subscription activated"
        );
        self.after_activation(&subscription).await;
        Ok(subscription)
    }

    /// Admin grant. Same transaction as a paid activation, without a payment.
    #[instrument(skip(self))]
    pub async fn grant(&self, user_id: UserId, plan_type: &str, trial: bool) -> AppResult<Subscription> {
        let plan = self.plan(plan_type)?;
        let mut input = ActivationInput::for_plan(user_id, plan, Utc::now());
        input.trial = trial;
        input.action = SubscriptionAction::Granted;

        let subscription = self.repo.activate(&input).await?;
        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription.id,
            plan_type = %subscription.plan_type,
            trial,
            "Subscription granted"
        );
        self.after_activation(&subscription).await;
        Ok(subscription)
    }

    /// Post-commit work for a new active subscription. Failures are logged only.
    pub async fn after_activation(&self, subscription: &Subscription) {
        let user_id = subscription.user_id;
        if let Err(e) = self.habit_locks.on_entitlement_granted(user_id).await {
            tracing::error!(user_id = %user_id, error = %e, "Failed to unlock habits after activation");
        }

        let notification = Notification::Activated {
            plan_name: subscription.plan_name.clone(),
            expires_at: subscription.expires_at,
        };
        notify_best_effort(self.notifier.as_ref(), user_id, &notification).await;
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId) -> AppResult<CancelOutcome> {
        let Some(subscription) = self.repo.cancel_active(user_id, Utc::now()).await? else {
            return Ok(CancelOutcome::NoActiveSubscription);
        };
        tracing::info!(user_id = %user_id, subscription_id = %subscription.id, "Subscription cancelled");

        if let Err(e) = self
            .habit_locks
            .on_entitlement_revoked(user_id, LockReason::SubscriptionCancelled)
            .await
        {
            tracing::error!(user_id = %user_id, error = %e, "Failed to lock habits after cancellation");
        }

        let notification = Notification::Cancelled {
            plan_name: subscription.plan_name.clone(),
        };
        notify_best_effort(self.notifier.as_ref(), user_id, &notification).await;

        Ok(CancelOutcome::Cancelled(subscription))
    }

    /// Current entitlement. An overdue active row is expired first.
    #[instrument(skip(self))]
    pub async fn check_status(&self, user_id: UserId) -> AppResult<SubscriptionStatus> {
        let now = Utc::now();
        let Some(subscription) = self.repo.get_active(user_id).await? else {
            return Ok(SubscriptionStatus::inactive());
        };

        if subscription.is_overdue(now) {
            tracing::debug!(user_id = %user_id, subscription_id = %subscription.id, "Lazily expiring overdue subscription");
            self.expiration.expire_one(subscription.id).await?;
            return match self.repo.get_active(user_id).await? {
                Some(current) => Ok(status_of(&current, now)),
                None => Ok(SubscriptionStatus::inactive()),
            };
        }

        Ok(status_of(&subscription, now))
    }

    pub async fn history(&self, user_id: UserId) -> AppResult<Vec<SubscriptionHistoryEntry>> {
        self.repo.list_history(user_id).await
    }

    pub async fn entitlement(&self, user_id: UserId) -> AppResult<UserEntitlement> {
        Ok(self
            .repo
            .get_entitlement(user_id)
            .await?
            .unwrap_or(UserEntitlement {
                user_id,
                is_premium: false,
                plan_type: None,
                expires_at: None,
            }))
    }
}

fn status_of(subscription: &Subscription, now: DateTime<Utc>) -> SubscriptionStatus {
    SubscriptionStatus {
        active: true,
        plan_type: Some(subscription.plan_type.clone()),
        plan_name: Some(subscription.plan_name.clone()),
        expires_at: subscription.expires_at,
        days_left: subscription.days_left(now),
    }
}

/// Sends a notification, logging instead of failing.
pub(crate) async fn notify_best_effort(
    notifier: &dyn Notifier,
    user_id: UserId,
    notification: &Notification,
) {
    if let Err(e) = notifier.notify(user_id, notification).await {
        tracing::warn!(
            user_id = %user_id,
            kind = notification.kind(),
            error = %e,
            "Failed to send notification"
        );
    }
}

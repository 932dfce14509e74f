use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::{
        ports::notifier::{Notification, Notifier},
        use_cases::{
            habit_lock::HabitLockUseCases,
            subscription::{ExpireOutcome, SubscriptionRepo, notify_best_effort},
        },
    },
    domain::entities::habit::LockReason,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    pub downgraded: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ExpirationUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    habit_locks: Arc<HabitLockUseCases>,
    notifier: Arc<dyn Notifier>,
}

impl ExpirationUseCases {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        habit_locks: Arc<HabitLockUseCases>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            habit_locks,
            notifier,
        }
    }

    /// Expires every overdue active subscription, one transaction per row.
    ///
    /// A failing row is logged and counted; the rest of the batch still runs.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self) -> AppResult<SweepReport> {
        let overdue = self.repo.list_overdue(Utc::now()).await?;
        let mut report = SweepReport {
            examined: overdue.len(),
            ..SweepReport::default()
        };

        for subscription in overdue {
            match self.expire_one(subscription.id).await {
                Ok(Some(outcome)) => {
                    if outcome.deactivated {
                        report.expired += 1;
                    }
                    if outcome.downgraded {
                        report.downgraded += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        subscription_id = %subscription.id,
                        user_id = %subscription.user_id,
                        error = %e,
                        "Failed to expire subscription"
                    );
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            expired = report.expired,
            downgraded = report.downgraded,
            failed = report.failed,
            "Expiration sweep finished"
        );
        Ok(report)
    }

    /// Single-row expiry shared by the sweep and lazy status checks.
    pub async fn expire_one(&self, subscription_id: Uuid) -> AppResult<Option<ExpireOutcome>> {
        let Some(outcome) = self.repo.expire(subscription_id, Utc::now()).await? else {
            return Ok(None);
        };
        let user_id = outcome.subscription.user_id;

        if outcome.downgraded {
            if let Err(e) = self
                .habit_locks
                .on_entitlement_revoked(user_id, LockReason::SubscriptionExpired)
                .await
            {
                tracing::error!(user_id = %user_id, error = %e, "Failed to lock habits after expiry");
            }
        }

        if outcome.deactivated {
            tracing::info!(
                user_id = %user_id,
                subscription_id = %subscription_id,
                downgraded = outcome.downgraded,
                "Subscription expired"
            );
            let notification = Notification::Expired {
                plan_name: outcome.subscription.plan_name.clone(),
            };
            notify_best_effort(self.notifier.as_ref(), user_id, &notification).await;
        }

        Ok(Some(outcome))
    }
}

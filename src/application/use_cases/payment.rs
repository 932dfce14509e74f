use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        promo::{PromoUseCases, PromoValidation, calculate_discounted_price},
        subscription::{ActivationInput, SubscriptionUseCases},
    },
    domain::{
        entities::{payment_status::PaymentStatus, subscription::Subscription, user::UserId},
        invoice_token,
        plan_catalog::PlanCatalog,
    },
};

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub token: String,
    pub gateway_charge_id: Option<String>,
    pub provider_charge_id: Option<String>,
    pub amount: i64,
    pub paid_amount: Option<i64>,
    pub currency: Option<String>,
    pub plan_type: String,
    pub promo_code_id: Option<Uuid>,
    pub discount_applied: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentInput {
    pub user_id: UserId,
    pub token: String,
    pub amount: i64,
    pub plan_type: String,
    pub promo_code_id: Option<Uuid>,
    pub discount_applied: i64,
}

/// Data written when a payment completes, plus the subscription it funds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletePaymentInput {
    pub token: String,
    pub gateway_charge_id: String,
    pub provider_charge_id: String,
    pub paid_amount: i64,
    pub currency: String,
    pub activation: ActivationInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed {
        subscription: Subscription,
        promo_applied: bool,
    },
    /// The charge id or the token was already completed.
    Duplicate,
}

/// Inbound payment notification, as delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub gateway_charge_id: String,
    pub provider_charge_id: String,
    pub token: String,
    pub amount: i64,
    pub currency: String,
    pub payer_external_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    BadToken,
    InvalidPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcceptOutcome {
    Applied { subscription_id: Uuid },
    Duplicate,
    Rejected { reason: RejectReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub token: String,
    pub amount: i64,
    pub plan_name: String,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait PaymentRepo: Send + Sync {
    /// Inserts a `pending` record unless one exists for the token; returns
    /// whichever record is stored.
    async fn create_pending(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord>;

    async fn get_by_token(&self, token: &str) -> AppResult<Option<PaymentRecord>>;

    async fn get_by_charge_id(&self, gateway_charge_id: &str) -> AppResult<Option<PaymentRecord>>;

    /// Moves the record to `processing`, creating it when no checkout record
    /// exists. A completed record is returned unchanged.
    async fn mark_processing(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord>;

    /// One transaction: complete the record by token with the charge id
    /// attached, activate the subscription, and apply the recorded promo.
    /// Unique violations on the charge id report `Duplicate`.
    async fn complete(&self, input: &CompletePaymentInput) -> AppResult<CompletionOutcome>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PaymentUseCases {
    repo: Arc<dyn PaymentRepo>,
    catalog: Arc<PlanCatalog>,
    promos: Arc<PromoUseCases>,
    subscriptions: Arc<SubscriptionUseCases>,
}

impl PaymentUseCases {
    pub fn new(
        repo: Arc<dyn PaymentRepo>,
        catalog: Arc<PlanCatalog>,
        promos: Arc<PromoUseCases>,
        subscriptions: Arc<SubscriptionUseCases>,
    ) -> Self {
        Self {
            repo,
            catalog,
            promos,
            subscriptions,
        }
    }

    /// Prices a plan for a user and records a pending payment for the token.
    #[instrument(skip(self))]
    pub async fn issue_invoice(
        &self,
        user_id: UserId,
        plan_type: &str,
        promo_code: Option<&str>,
    ) -> AppResult<Invoice> {
        let plan = self
            .catalog
            .get(plan_type)
            .ok_or_else(|| AppError::InvalidPlan(plan_type.to_string()))?;

        let (amount, promo_code_id) = match promo_code.filter(|c| !c.trim().is_empty()) {
            Some(code) => match self.promos.validate(code, user_id, plan_type).await? {
                PromoValidation::Valid(promo) => (
                    calculate_discounted_price(
                        plan.price_units,
                        promo.discount_percent,
                        promo.discount_stars,
                    ),
                    Some(promo.promo_id),
                ),
                PromoValidation::Invalid { reason } => return Err(AppError::PromoInvalid(reason)),
            },
            None => (plan.price_units, None),
        };

        let token = invoice_token::encode(user_id, plan_type);
        let record = self
            .begin_checkout(&CreatePaymentInput {
                user_id,
                token,
                amount,
                plan_type: plan.plan_type.clone(),
                promo_code_id,
                discount_applied: plan.price_units - amount,
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            plan_type = %plan.plan_type,
            amount,
            promo = promo_code_id.is_some(),
            "Invoice issued"
        );

        Ok(Invoice {
            token: record.token,
            amount: record.amount,
            plan_name: plan.name.clone(),
        })
    }

    /// First writer wins: an existing record for the token is returned as is.
    pub async fn begin_checkout(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord> {
        self.repo.create_pending(input).await
    }

    /// Turns one gateway notification into at most one subscription activation.
    ///
    /// Redelivery of a completed charge is `Duplicate` with no writes. Store
    /// failures are returned so the gateway retries; the record is left
    /// pending or processing.
    #[instrument(skip(self, notification), fields(charge_id = %notification.gateway_charge_id))]
    pub async fn accept_notification(
        &self,
        notification: &PaymentNotification,
    ) -> AppResult<AcceptOutcome> {
        if let Some(existing) = self.repo.get_by_charge_id(&notification.gateway_charge_id).await? {
            if !existing.status.can_transition_to(PaymentStatus::Processing) {
                tracing::info!(payment_id = %existing.id, "Duplicate payment notification");
                return Ok(AcceptOutcome::Duplicate);
            }
        }

        let token = match invoice_token::decode(&notification.token) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected payment notification with bad token");
                return Ok(AcceptOutcome::Rejected {
                    reason: RejectReason::BadToken,
                });
            }
        };

        let Some(plan) = self.catalog.get(&token.plan_type) else {
            tracing::warn!(plan_type = %token.plan_type, "Rejected payment notification for unknown plan");
            return Ok(AcceptOutcome::Rejected {
                reason: RejectReason::InvalidPlan,
            });
        };

        if notification.payer_external_id != token.user_id.to_string() {
            tracing::warn!(
                user_id = %token.user_id,
                payer = %notification.payer_external_id,
                "Payer does not match invoice owner"
            );
        }

        let record = self
            .repo
            .mark_processing(&CreatePaymentInput {
                user_id: token.user_id,
                token: notification.token.clone(),
                amount: notification.amount,
                plan_type: plan.plan_type.clone(),
                promo_code_id: None,
                discount_applied: 0,
            })
            .await?;
        if !record.status.can_transition_to(PaymentStatus::Completed) {
            tracing::info!(payment_id = %record.id, "Token already paid by another charge");
            return Ok(AcceptOutcome::Duplicate);
        }
        if record.amount != notification.amount {
            tracing::warn!(
                payment_id = %record.id,
                invoiced = record.amount,
                paid = notification.amount,
                "Paid amount differs from invoice"
            );
        }

        let mut activation = ActivationInput::for_plan(token.user_id, plan, Utc::now());
        activation.payment_reference = Some(notification.gateway_charge_id.clone());

        let outcome = self
            .repo
            .complete(&CompletePaymentInput {
                token: notification.token.clone(),
                gateway_charge_id: notification.gateway_charge_id.clone(),
                provider_charge_id: notification.provider_charge_id.clone(),
                paid_amount: notification.amount,
                currency: notification.currency.clone(),
                activation,
            })
            .await?;

        match outcome {
            CompletionOutcome::Duplicate => {
                tracing::info!(payment_id = %record.id, "Concurrent duplicate payment notification");
                Ok(AcceptOutcome::Duplicate)
            }
            CompletionOutcome::Completed {
                subscription,
                promo_applied,
            } => {
                tracing::info!(
                    payment_id = %record.id,
                    user_id = %subscription.user_id,
                    subscription_id = %subscription.id,
                    promo_applied,
                    "Payment applied"
                );
                self.subscriptions.after_activation(&subscription).await;
                Ok(AcceptOutcome::Applied {
                    subscription_id: subscription.id,
                })
            }
        }
    }
}

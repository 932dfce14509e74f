use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::{
        entities::{
            promo_code::{PromoCode, PromoRejection, normalize_code},
            user::UserId,
        },
        plan_catalog::PlanCatalog,
    },
};

// ============================================================================
// Profile Types
// ============================================================================

/// A promo code that passed every check for one user and plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidPromo {
    pub promo_id: Uuid,
    pub code: String,
    pub discount_percent: Option<i32>,
    pub discount_stars: Option<i64>,
    pub bonus_days: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromoValidation {
    Valid(ValidPromo),
    Invalid { reason: PromoRejection },
}

/// Validation result plus the price the user would pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoQuote {
    pub validation: PromoValidation,
    pub base_price: i64,
    pub final_price: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePromoInput {
    pub code: String,
    pub discount_percent: Option<i32>,
    pub discount_stars: Option<i64>,
    pub bonus_days: Option<i32>,
    pub max_uses: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub applicable_plans: Option<Vec<String>>,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait PromoCodeRepo: Send + Sync {
    /// `code` is already normalized.
    async fn get_by_code(&self, code: &str) -> AppResult<Option<PromoCode>>;
    async fn has_use(&self, promo_id: Uuid, user_id: UserId) -> AppResult<bool>;
    /// Unique violation on `code` surfaces as `InvalidInput`.
    async fn create(&self, input: &CreatePromoInput) -> AppResult<PromoCode>;
}

// ============================================================================
// Pricing
// ============================================================================

/// Applies a promo discount to `base`.
///
/// A percent discount wins when both kinds are configured. The discounted
/// price is rounded half away from zero; a stars discount floors at zero.
pub fn calculate_discounted_price(
    base: i64,
    discount_percent: Option<i32>,
    discount_stars: Option<i64>,
) -> i64 {
    let base = base.max(0);
    if let Some(percent) = discount_percent {
        let kept = i64::from(100 - percent.clamp(0, 100));
        return (base * kept + 50) / 100;
    }
    if let Some(stars) = discount_stars {
        return (base - stars.max(0)).max(0);
    }
    base
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PromoUseCases {
    repo: Arc<dyn PromoCodeRepo>,
    catalog: Arc<PlanCatalog>,
}

impl PromoUseCases {
    pub fn new(repo: Arc<dyn PromoCodeRepo>, catalog: Arc<PlanCatalog>) -> Self {
        Self { repo, catalog }
    }

    /// Checks a code for one user and plan. First failing check wins.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        code: &str,
        user_id: UserId,
        plan_type: &str,
    ) -> AppResult<PromoValidation> {
        let now = Utc::now();
        let promo = match self.repo.get_by_code(&normalize_code(code)).await? {
            Some(promo) => promo,
            None => return Ok(invalid(PromoRejection::NotFound)),
        };

        if !promo.is_active {
            return Ok(invalid(PromoRejection::Inactive));
        }
        if promo.valid_from.is_some_and(|from| now < from) {
            return Ok(invalid(PromoRejection::NotYetValid));
        }
        if promo.valid_until.is_some_and(|until| now > until) {
            return Ok(invalid(PromoRejection::Expired));
        }
        if promo.is_exhausted() {
            return Ok(invalid(PromoRejection::Exhausted));
        }
        if self.repo.has_use(promo.id, user_id).await? {
            return Ok(invalid(PromoRejection::AlreadyUsed));
        }
        if !promo.applies_to(plan_type) {
            return Ok(invalid(PromoRejection::NotApplicable));
        }

        Ok(PromoValidation::Valid(ValidPromo {
            promo_id: promo.id,
            code: promo.code,
            discount_percent: promo.discount_percent,
            discount_stars: promo.discount_stars,
            bonus_days: promo.bonus_days,
        }))
    }

    /// Validates a code and previews the discounted price of a plan.
    pub async fn quote(
        &self,
        code: &str,
        user_id: UserId,
        plan_type: &str,
    ) -> AppResult<PromoQuote> {
        let plan = self
            .catalog
            .get(plan_type)
            .ok_or_else(|| AppError::InvalidPlan(plan_type.to_string()))?;

        let validation = self.validate(code, user_id, plan_type).await?;
        let final_price = match &validation {
            PromoValidation::Valid(promo) => calculate_discounted_price(
                plan.price_units,
                promo.discount_percent,
                promo.discount_stars,
            ),
            PromoValidation::Invalid { .. } => plan.price_units,
        };

        Ok(PromoQuote {
            validation,
            base_price: plan.price_units,
            final_price,
        })
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_promo(&self, mut input: CreatePromoInput) -> AppResult<PromoCode> {
        input.code = normalize_code(&input.code);
        if input.code.is_empty() {
            return Err(AppError::InvalidInput("Promo code must not be empty".into()));
        }
        if input.discount_percent.is_none() && input.discount_stars.is_none() && input.bonus_days.is_none() {
            return Err(AppError::InvalidInput(
                "Promo code must grant a discount or bonus days".into(),
            ));
        }
        if input.discount_percent.is_some_and(|p| !(0..=100).contains(&p)) {
            return Err(AppError::InvalidInput(
                "discount_percent must be between 0 and 100".into(),
            ));
        }
        if input.discount_stars.is_some_and(|s| s < 0) || input.bonus_days.is_some_and(|d| d < 0) {
            return Err(AppError::InvalidInput("Promo amounts must not be negative".into()));
        }
        if input.max_uses.is_some_and(|m| m <= 0) {
            return Err(AppError::InvalidInput("max_uses must be positive".into()));
        }
        if let (Some(from), Some(until)) = (input.valid_from, input.valid_until) {
            if from > until {
                return Err(AppError::InvalidInput(
                    "valid_from must not be after valid_until".into(),
                ));
            }
        }
        if let Some(plans) = &input.applicable_plans {
            if let Some(unknown) = plans.iter().find(|p| self.catalog.get(p).is_none()) {
                return Err(AppError::InvalidPlan(unknown.clone()));
            }
        }

        let promo = self.repo.create(&input).await?;
        tracing::info!(promo_id = %promo.id, "Promo code created");
        Ok(promo)
    }
}

fn invalid(reason: PromoRejection) -> PromoValidation {
    PromoValidation::Invalid { reason }
}

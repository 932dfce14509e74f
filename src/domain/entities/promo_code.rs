use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoCode {
    pub id: Uuid,
    /// Stored normalized (see [`normalize_code`]).
    pub code: String,
    pub discount_percent: Option<i32>,
    pub discount_stars: Option<i64>,
    pub bonus_days: Option<i32>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// `None` means every plan is eligible.
    pub applicable_plans: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl PromoCode {
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.used_count >= max)
    }

    pub fn applies_to(&self, plan_type: &str) -> bool {
        match &self.applicable_plans {
            Some(plans) => plans.iter().any(|p| p == plan_type),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoUse {
    pub id: Uuid,
    pub promo_id: Uuid,
    pub user_id: UserId,
    pub subscription_id: Uuid,
    pub discount_applied: i64,
    pub created_at: DateTime<Utc>,
}

/// Why a promo code cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoRejection {
    NotFound,
    Inactive,
    NotYetValid,
    Expired,
    Exhausted,
    AlreadyUsed,
    NotApplicable,
}

impl PromoRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoRejection::NotFound => "not_found",
            PromoRejection::Inactive => "inactive",
            PromoRejection::NotYetValid => "not_yet_valid",
            PromoRejection::Expired => "expired",
            PromoRejection::Exhausted => "exhausted",
            PromoRejection::AlreadyUsed => "already_used",
            PromoRejection::NotApplicable => "not_applicable",
        }
    }
}

impl std::fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

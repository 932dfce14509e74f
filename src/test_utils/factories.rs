//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    habit::HabitLockState,
    promo_code::{PromoCode, PromoUse},
    subscription::Subscription,
    user::UserId,
};

/// Create an active, unrestricted promo code with no discount configured.
pub fn create_test_promo(code: &str, overrides: impl FnOnce(&mut PromoCode)) -> PromoCode {
    let mut promo = PromoCode {
        id: Uuid::new_v4(),
        code: code.to_string(),
        discount_percent: None,
        discount_stars: None,
        bonus_days: None,
        max_uses: None,
        used_count: 0,
        valid_from: None,
        valid_until: None,
        is_active: true,
        applicable_plans: None,
        created_at: test_datetime(),
    };
    overrides(&mut promo);
    promo
}

pub fn create_test_promo_use(
    promo_id: Uuid,
    user_id: UserId,
    overrides: impl FnOnce(&mut PromoUse),
) -> PromoUse {
    let mut promo_use = PromoUse {
        id: Uuid::new_v4(),
        promo_id,
        user_id,
        subscription_id: Uuid::new_v4(),
        discount_applied: 0,
        created_at: test_datetime(),
    };
    overrides(&mut promo_use);
    promo_use
}

/// Create an active 1-month subscription with ten days left.
pub fn create_test_subscription(
    user_id: UserId,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let now = Utc::now();
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        user_id,
        plan_type: "1_month".to_string(),
        plan_name: "1 Month".to_string(),
        price_units: 100,
        started_at: now - Duration::days(20),
        expires_at: Some(now + Duration::days(10)),
        active: true,
        trial: false,
        payment_reference: None,
        cancelled_at: None,
        created_at: now - Duration::days(20),
    };
    overrides(&mut subscription);
    subscription
}

/// Create an active, unlocked, free-tier habit.
pub fn create_test_habit(owner_id: UserId, overrides: impl FnOnce(&mut HabitLockState)) -> HabitLockState {
    let mut habit = HabitLockState {
        id: Uuid::new_v4(),
        owner_id,
        is_active: true,
        is_premium_tier: false,
        locked_at: None,
        locked_reason: None,
        created_at: Utc::now(),
    };
    overrides(&mut habit);
    habit
}

/// Fixed datetime for deterministic tests.
pub fn test_datetime() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_225_600, 0).unwrap_or_default()
}

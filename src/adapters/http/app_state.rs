use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    domain::plan_catalog::PlanCatalog,
    infra::config::AppConfig,
    use_cases::{
        expiration::ExpirationUseCases, habit_lock::HabitLockUseCases, payment::PaymentUseCases,
        promo::PromoUseCases, subscription::SubscriptionUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<PlanCatalog>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub promo_use_cases: Arc<PromoUseCases>,
    pub habit_lock_use_cases: Arc<HabitLockUseCases>,
    pub expiration_use_cases: Arc<ExpirationUseCases>,
}

impl FromRef<AppState> for Arc<PlanCatalog> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.catalog.clone()
    }
}

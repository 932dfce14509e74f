//! Wires every use case to one in-memory store and a recording notifier.

use std::net::SocketAddr;
use std::sync::Arc;

use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        expiration::ExpirationUseCases, habit_lock::HabitLockUseCases, payment::PaymentUseCases,
        promo::PromoUseCases, subscription::SubscriptionUseCases,
    },
    domain::plan_catalog::PlanCatalog,
    infra::config::AppConfig,
    test_utils::{InMemoryNotifier, InMemoryStore},
};

pub const TEST_FREE_QUOTA: usize = 3;
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_ADMIN_TOKEN: &str = "admin_test_token";

pub struct TestServices {
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<InMemoryNotifier>,
    pub catalog: Arc<PlanCatalog>,
    pub habit_locks: Arc<HabitLockUseCases>,
    pub expiration: Arc<ExpirationUseCases>,
    pub subscriptions: Arc<SubscriptionUseCases>,
    pub promos: Arc<PromoUseCases>,
    pub payments: Arc<PaymentUseCases>,
}

impl TestServices {
    pub fn new() -> Self {
        Self::build(PlanCatalog::default(), InMemoryNotifier::new())
    }

    pub fn with_notifier(notifier: InMemoryNotifier) -> Self {
        Self::build(PlanCatalog::default(), notifier)
    }

    /// Default catalog with one plan repriced.
    pub fn with_catalog_price(plan_type: &str, price_units: i64) -> Self {
        let mut plans = PlanCatalog::default().plans().to_vec();
        for plan in plans.iter_mut().filter(|p| p.plan_type == plan_type) {
            plan.price_units = price_units;
        }
        let catalog = PlanCatalog::new(plans).unwrap();
        Self::build(catalog, InMemoryNotifier::new())
    }

    fn build(catalog: PlanCatalog, notifier: InMemoryNotifier) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(notifier);
        let catalog = Arc::new(catalog);

        let habit_locks = Arc::new(HabitLockUseCases::new(store.clone(), TEST_FREE_QUOTA));
        let expiration = Arc::new(ExpirationUseCases::new(
            store.clone(),
            habit_locks.clone(),
            notifier.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionUseCases::new(
            store.clone(),
            catalog.clone(),
            habit_locks.clone(),
            expiration.clone(),
            notifier.clone(),
        ));
        let promos = Arc::new(PromoUseCases::new(store.clone(), catalog.clone()));
        let payments = Arc::new(PaymentUseCases::new(
            store.clone(),
            catalog.clone(),
            promos.clone(),
            subscriptions.clone(),
        ));

        Self {
            store,
            notifier,
            catalog,
            habit_locks,
            expiration,
            subscriptions,
            promos,
            payments,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            config: Arc::new(test_config()),
            catalog: self.catalog.clone(),
            payment_use_cases: self.payments.clone(),
            subscription_use_cases: self.subscriptions.clone(),
            promo_use_cases: self.promos.clone(),
            habit_lock_use_cases: self.habit_locks.clone(),
            expiration_use_cases: self.expiration.clone(),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/habit_premium_test".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        admin_token: Some(SecretString::new(TEST_ADMIN_TOKEN.into())),
        telegram_bot_token: None,
        telegram_api_base: "http://127.0.0.1:9".to_string(),
        plan_catalog_path: None,
        free_habit_quota: TEST_FREE_QUOTA,
        sweep_interval_secs: 86_400,
        db_max_connections: 1,
    }
}

use crate::{
    adapters::{
        http::app_state::AppState,
        notify::{log::LogNotifier, telegram::TelegramNotifier},
        persistence::PostgresPersistence,
    },
    application::ports::notifier::Notifier,
    domain::plan_catalog::PlanCatalog,
    infra::{config::AppConfig, db::init_db, error::InfraError},
    use_cases::{
        expiration::ExpirationUseCases,
        habit_lock::{HabitLockRepo, HabitLockUseCases},
        payment::{PaymentRepo, PaymentUseCases},
        promo::{PromoCodeRepo, PromoUseCases},
        subscription::{SubscriptionRepo, SubscriptionUseCases},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> Result<AppState, InfraError> {
    let config = AppConfig::from_env();

    let catalog = match &config.plan_catalog_path {
        Some(path) => PlanCatalog::from_json_file(path)?,
        None => PlanCatalog::default(),
    };
    tracing::info!(plans = catalog.plans().len(), "Plan catalog loaded");
    let catalog = Arc::new(catalog);

    let pool = init_db(&config.database_url, config.db_max_connections).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let notifier: Arc<dyn Notifier> = match &config.telegram_bot_token {
        Some(token) => Arc::new(
            TelegramNotifier::new(token.clone(), config.telegram_api_base.clone())
                .map_err(InfraError::HttpClient)?,
        ),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let subscription_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let payment_repo_arc = postgres_arc.clone() as Arc<dyn PaymentRepo>;
    let promo_repo_arc = postgres_arc.clone() as Arc<dyn PromoCodeRepo>;
    let habit_lock_repo_arc = postgres_arc.clone() as Arc<dyn HabitLockRepo>;

    let habit_lock_use_cases = Arc::new(HabitLockUseCases::new(
        habit_lock_repo_arc,
        config.free_habit_quota,
    ));

    let expiration_use_cases = Arc::new(ExpirationUseCases::new(
        subscription_repo_arc.clone(),
        habit_lock_use_cases.clone(),
        notifier.clone(),
    ));

    let subscription_use_cases = Arc::new(SubscriptionUseCases::new(
        subscription_repo_arc,
        catalog.clone(),
        habit_lock_use_cases.clone(),
        expiration_use_cases.clone(),
        notifier,
    ));

    let promo_use_cases = Arc::new(PromoUseCases::new(promo_repo_arc, catalog.clone()));

    let payment_use_cases = Arc::new(PaymentUseCases::new(
        payment_repo_arc,
        catalog.clone(),
        promo_use_cases.clone(),
        subscription_use_cases.clone(),
    ));

    Ok(AppState {
        config: Arc::new(config),
        catalog,
        payment_use_cases,
        subscription_use_cases,
        promo_use_cases,
        habit_lock_use_cases,
        expiration_use_cases,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "habit_premium=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), skipped when the file cannot be created
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}

//! Operator endpoints, mounted behind `admin_auth_middleware`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;

use super::parse_user_id;
use crate::{
    adapters::http::app_state::AppState, app_error::AppResult, use_cases::promo::CreatePromoInput,
};

#[derive(Deserialize)]
struct GrantPayload {
    plan_type: String,
    #[serde(default)]
    trial: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/grant", post(grant_subscription))
        .route("/promos", post(create_promo))
        .route("/sweep", post(run_sweep))
}

async fn grant_subscription(
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<GrantPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&user_id)?;
    let subscription = app_state
        .subscription_use_cases
        .grant(user_id, &payload.plan_type, payload.trial)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn create_promo(
    State(app_state): State<AppState>,
    Json(payload): Json<CreatePromoInput>,
) -> AppResult<impl IntoResponse> {
    let promo = app_state.promo_use_cases.create_promo(payload).await?;
    Ok((StatusCode::CREATED, Json(promo)))
}

async fn run_sweep(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let report = app_state.expiration_use_cases.run_sweep().await?;
    Ok(Json(report))
}

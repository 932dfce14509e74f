use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{ItemsResponse, RawUserId, parse_user_id};
use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    domain::entities::user::UserId,
    infra::webhook_signature::{SIGNATURE_HEADER, verify_signature},
    use_cases::{payment::PaymentNotification, subscription::CancelOutcome},
};

#[derive(Deserialize)]
struct InvoicePayload {
    user_id: RawUserId,
    plan_type: String,
    #[serde(default)]
    promo_code: Option<String>,
}

#[derive(Deserialize)]
struct PromoCheckPayload {
    code: String,
    user_id: RawUserId,
    plan_type: String,
}

#[derive(Serialize)]
struct CancelResponse {
    success: bool,
    message: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(payment_webhook))
        .route("/invoices", post(create_invoice))
        .route("/promo/check", post(check_promo))
        .route("/users/{user_id}/status", get(subscription_status))
        .route("/users/{user_id}/history", get(subscription_history))
        .route("/users/{user_id}/locked-habits", get(locked_habits))
        .route("/users/{user_id}/cancel", post(cancel_subscription))
}

/// POST /billing/webhook
///
/// Rejected notifications are acknowledged with 200 so the gateway stops
/// retrying; store failures answer 503 so it retries.
async fn payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    verify_signature(
        app_state.config.webhook_secret.expose_secret(),
        &body,
        signature,
    )?;

    let notification: PaymentNotification = serde_json::from_slice(&body).map_err(|e| {
        AppError::InvalidInput(format!("Invalid payment notification: {e}"))
    })?;

    let outcome = app_state
        .payment_use_cases
        .accept_notification(&notification)
        .await?;
    Ok(Json(outcome))
}

async fn create_invoice(
    State(app_state): State<AppState>,
    Json(payload): Json<InvoicePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = UserId::try_from(payload.user_id)?;
    let invoice = app_state
        .payment_use_cases
        .issue_invoice(user_id, &payload.plan_type, payload.promo_code.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn check_promo(
    State(app_state): State<AppState>,
    Json(payload): Json<PromoCheckPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = UserId::try_from(payload.user_id)?;
    let quote = app_state
        .promo_use_cases
        .quote(&payload.code, user_id, &payload.plan_type)
        .await?;
    Ok(Json(quote))
}

async fn subscription_status(
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&user_id)?;
    let status = app_state.subscription_use_cases.check_status(user_id).await?;
    Ok(Json(status))
}

async fn subscription_history(
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&user_id)?;
    let items = app_state.subscription_use_cases.history(user_id).await?;
    Ok(Json(ItemsResponse { items }))
}

async fn locked_habits(
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&user_id)?;
    let items = app_state.habit_lock_use_cases.locked_habits(user_id).await?;
    Ok(Json(ItemsResponse { items }))
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&user_id)?;
    let response = match app_state.subscription_use_cases.cancel(user_id).await? {
        CancelOutcome::Cancelled(_) => CancelResponse {
            success: true,
            message: "Subscription cancelled",
        },
        CancelOutcome::NoActiveSubscription => CancelResponse {
            success: false,
            message: "No active subscription",
        },
    };
    Ok(Json(response))
}

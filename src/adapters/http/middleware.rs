use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;

use crate::{adapters::http::app_state::AppState, app_error::AppError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin routes are hidden entirely when no admin token is configured.
pub async fn admin_auth_middleware(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = app_state.config.admin_token.as_ref() else {
        return Err(AppError::NotFound);
    };

    let provided = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() || !constant_time_compare(provided, expected.expose_secret()) {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

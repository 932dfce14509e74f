pub mod admin;
pub mod billing;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    domain::entities::user::UserId,
};

#[derive(Serialize)]
struct ItemsResponse<T> {
    items: Vec<T>,
}

/// User ids arrive as JSON numbers or numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Number(i64),
    Text(String),
}

impl TryFrom<RawUserId> for UserId {
    type Error = AppError;

    fn try_from(raw: RawUserId) -> AppResult<Self> {
        match raw {
            RawUserId::Number(id) if id > 0 => Ok(UserId(id)),
            RawUserId::Number(_) => Err(AppError::InvalidInput("user_id must be positive".into())),
            RawUserId::Text(text) => parse_user_id(&text),
        }
    }
}

fn parse_user_id(raw: &str) -> AppResult<UserId> {
    raw.parse::<UserId>().map_err(AppError::InvalidInput)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .nest("/billing", billing::router())
}

async fn list_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(ItemsResponse {
        items: app_state.catalog.plans().to_vec(),
    }))
}

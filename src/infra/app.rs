use axum::{Router, http, middleware, routing::get};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::adapters::{
    self,
    http::{app_state::AppState, middleware::admin_auth_middleware},
};

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", adapters::http::routes::router())
        .nest(
            "/api/admin",
            adapters::http::routes::admin::router().route_layer(
                middleware::from_fn_with_state(app_state.clone(), admin_auth_middleware),
            ),
        )
        .with_state(app_state)
        .layer(SetResponseHeaderLayer::if_not_present(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http-request",
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    request_id = %request_id
                )
            }),
        )
}

async fn health() -> &'static str {
    "ok"
}

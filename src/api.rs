pub(crate) mod generate;
pub(crate) mod health;
pub(crate) mod metrics;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/options/generate", post(generate::generate_options))
        .route("/v1/guides/sweep", post(generate::trigger_sweep))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

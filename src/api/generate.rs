use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{app::AppState, pipeline::GenerationResult, scheduler::SweepContext};

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateOptionsRequest {
    title: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct SweepAcceptedResponse {
    sweep_id: Uuid,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SweepRejectedResponse {
    status: &'static str,
}

/// 生成結果は成否にかかわらず 200 で返し、本文の `success` で区別する。
pub(crate) async fn generate_options(
    State(state): State<AppState>,
    Json(payload): Json<GenerateOptionsRequest>,
) -> Json<GenerationResult<Vec<String>>> {
    Json(
        state
            .option_generator()
            .generate_options(&payload.title, payload.count)
            .await,
    )
}

pub(crate) async fn trigger_sweep(State(state): State<AppState>) -> impl IntoResponse {
    state.telemetry().record_manual_sweep_invocation();

    let scheduler = state.scheduler().clone();
    let Some(permit) = scheduler.try_acquire_sweep() else {
        warn!("manual guide sweep rejected; another sweep is still running");
        let body = Json(SweepRejectedResponse {
            status: "already_running",
        });
        return (StatusCode::CONFLICT, body).into_response();
    };

    let sweep_id = Uuid::new_v4();
    tokio::spawn(async move {
        match scheduler
            .run_guide_sweep_with(SweepContext::new(sweep_id), permit)
            .await
        {
            Ok(report) => info!(
                %sweep_id,
                generated = report.generated,
                failed = report.failed,
                "manual guide sweep finished"
            ),
            Err(error) => error!(%sweep_id, error = ?error, "manual guide sweep failed"),
        }
    });

    let body = Json(SweepAcceptedResponse {
        sweep_id,
        status: "accepted",
    });

    (StatusCode::ACCEPTED, body).into_response()
}

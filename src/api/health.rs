use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl HealthReport {
    fn ready() -> Self {
        Self {
            status: "ready",
            detail: None,
        }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: "degraded",
            detail: Some(detail.into()),
        }
    }
}

/// 言語モデルと投票バックエンドの両方に到達できる場合のみ ready を返す。
pub(crate) async fn ready(
    State(state): State<AppState>,
) -> Result<Json<HealthReport>, (StatusCode, Json<HealthReport>)> {
    state.telemetry().record_ready_probe();

    if let Err(error) = state.ai().health_check().await {
        error!(error = %format!("{error:#}"), "language model readiness check failed");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport::degraded(format!("language_model: {error:#}"))),
        ));
    }

    if let Err(error) = state.poll_backend().ping().await {
        error!(error = %format!("{error:#}"), "poll-backend readiness check failed");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport::degraded(format!("poll_backend: {error:#}"))),
        ));
    }

    Ok(Json(HealthReport::ready()))
}

pub(crate) async fn live() -> Json<HealthReport> {
    Json(HealthReport {
        status: "live",
        detail: None,
    })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::app::{build_router, tests::registry_for};

    async fn get(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    #[tokio::test]
    async fn live_always_succeeds() {
        let router = build_router(registry_for("http://127.0.0.1:9/", "http://127.0.0.1:9/"));
        let (status, body) = get(router, "/health/live").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "live");
    }

    #[tokio::test]
    async fn ready_when_dependencies_respond() {
        let llm = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&llm)
            .await;
        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&backend)
            .await;

        let router = build_router(registry_for(&llm.uri(), &backend.uri()));
        let (status, body) = get(router, "/health/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn degraded_when_poll_backend_is_down() {
        let llm = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&llm)
            .await;
        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&backend)
            .await;

        let router = build_router(registry_for(&llm.uri(), &backend.uri()));
        let (status, body) = get(router, "/health/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert!(body["detail"]
            .as_str()
            .is_some_and(|detail| detail.starts_with("poll_backend")));
    }
}

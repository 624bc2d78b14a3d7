/// 投票バックエンド（永続化コラボレーター）クライアント。
///
/// 締め切り済み投票の取得とガイドの登録を行う。取得は再試行付き。
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::store::{GuideRecord, GuideStore, VoteAggregate};
use crate::util::retry::{RetryConfig, with_retry};

#[derive(Debug, Deserialize)]
struct PendingVotesResponse {
    data: Vec<VoteAggregate>,
}

/// 投票バックエンドクライアントの設定。
#[derive(Debug, Clone)]
pub struct PollBackendConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub service_token: Option<String>,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct PollBackendClient {
    client: Client,
    base_url: Url,
    service_token: Option<String>,
    retry: RetryConfig,
}

impl PollBackendClient {
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: PollBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build poll-backend HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid poll-backend base URL")?;

        Ok(Self {
            client,
            base_url,
            service_token: config.service_token,
            retry: config.retry,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.service_token {
            Some(ref token) => request.header("X-Service-Token", token),
            None => request,
        }
    }

    async fn fetch_pending_once(&self, url: Url) -> Result<Vec<VoteAggregate>> {
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .context("poll-backend pending votes request failed")?
            .error_for_status()
            .context("poll-backend pending votes endpoint returned error status")?;

        let body: PendingVotesResponse = response
            .json()
            .await
            .context("failed to deserialize poll-backend pending votes response")?;

        Ok(body.data)
    }

    /// ヘルスチェックエンドポイントを呼び出す。
    ///
    /// # Errors
    /// リクエストが失敗した場合、またはサーバーがエラー状態を返した場合はエラーを返します。
    pub async fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("v1/health")
            .context("failed to build health URL")?;

        self.client
            .get(url)
            .send()
            .await
            .context("poll-backend health request failed")?
            .error_for_status()
            .context("poll-backend health endpoint returned error status")?;

        Ok(())
    }
}

#[async_trait]
impl GuideStore for PollBackendClient {
    async fn pending_votes(&self) -> Result<Vec<VoteAggregate>> {
        let url = self
            .base_url
            .join("v1/internal/votes/closed-without-guide")
            .context("failed to build pending votes URL")?;

        let votes = with_retry(self.retry, "poll_backend.pending_votes", || {
            self.fetch_pending_once(url.clone())
        })
        .await?;

        debug!(count = votes.len(), "fetched closed votes pending a guide");
        Ok(votes)
    }

    async fn save_guide(&self, guide: &GuideRecord) -> Result<()> {
        let url = self
            .base_url
            .join("v1/internal/guides")
            .context("failed to build guides URL")?;

        // 登録は冪等でないため再試行しない
        self.authorize(self.client.post(url).json(guide))
            .send()
            .await
            .context("poll-backend guide registration failed")?
            .error_for_status()
            .context("poll-backend guide endpoint returned error status")?;

        info!(vote_id = guide.vote_id, "guide registered with poll-backend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GuideType;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> PollBackendConfig {
        PollBackendConfig {
            base_url,
            connect_timeout: Duration::from_secs(3),
            total_timeout: Duration::from_secs(30),
            service_token: Some("test-token".to_string()),
            retry: RetryConfig::new(3, 1, 5),
        }
    }

    #[tokio::test]
    async fn ping_succeeds_for_ok_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = PollBackendClient::new(test_config(server.uri())).expect("client should build");
        client.ping().await.expect("ping should succeed");
    }

    #[tokio::test]
    async fn pending_votes_parses_aggregates_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/internal/votes/closed-without-guide"))
            .and(header("X-Service-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "vote_id": 42,
                    "title": "Favorite travel destination",
                    "category": "travel",
                    "options": [
                        {"content": "Paris", "count": 3},
                        {"content": "Rome", "count": 1}
                    ],
                    "tail": {"question": "Why?", "answers": ["Food", "Art"]}
                }]
            })))
            .mount(&server)
            .await;

        let client = PollBackendClient::new(test_config(server.uri())).expect("client should build");
        let votes = client.pending_votes().await.expect("fetch succeeds");

        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote_id, 42);
        assert_eq!(votes[0].options.len(), 2);
        assert_eq!(
            votes[0].tail.as_ref().map(|tail| tail.answers.len()),
            Some(2)
        );
    }

    #[tokio::test]
    async fn pending_votes_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/internal/votes/closed-without-guide"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/internal/votes/closed-without-guide"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let client = PollBackendClient::new(test_config(server.uri())).expect("client should build");
        let votes = client.pending_votes().await.expect("retry succeeds");

        assert!(votes.is_empty());
    }

    #[tokio::test]
    async fn pending_votes_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/internal/votes/closed-without-guide"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = PollBackendClient::new(test_config(server.uri())).expect("client should build");
        let error = client.pending_votes().await.expect_err("404 should fail");

        assert!(error.to_string().contains("error status"));
    }

    #[tokio::test]
    async fn save_guide_posts_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/internal/guides"))
            .and(body_partial_json(serde_json::json!({
                "vote_id": 7,
                "title": "파리 여행",
                "type": "AI"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = PollBackendClient::new(test_config(server.uri())).expect("client should build");
        client
            .save_guide(&GuideRecord {
                vote_id: 7,
                title: "파리 여행".into(),
                content: "에펠탑을 방문하세요.".into(),
                category: "travel".into(),
                guide_type: GuideType::Ai,
                created_at: Utc::now(),
            })
            .await
            .expect("save succeeds");
    }
}

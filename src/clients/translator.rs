/// 外部翻訳エンドポイント（MyMemory互換）クライアントと、失敗時に原文を返す翻訳アダプタ。
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::util::text::preview;

/// 1区間分のテキストを翻訳するバックエンド。
///
/// 実装はエラーを返してよい。呼び出し側への失敗伝播は [`Translator`] が遮断する。
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// 翻訳クライアントの設定。
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TranslationEnvelope {
    #[serde(rename = "responseData")]
    response_data: Option<TranslationData>,
    #[serde(rename = "responseStatus")]
    response_status: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TranslationData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

/// `GET /get?q=..&langpair=src|dst` 形式の翻訳APIクライアント。
#[derive(Debug, Clone)]
pub struct MyMemoryClient {
    client: Client,
    base_url: Url,
}

impl MyMemoryClient {
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: TranslatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build translator HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid translator base URL")?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl TranslationBackend for MyMemoryClient {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let mut url = self
            .base_url
            .join("get")
            .context("failed to build translation URL")?;
        url.query_pairs_mut()
            .append_pair("q", text)
            .append_pair("langpair", &format!("{source}|{target}"));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("translation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "translation endpoint returned error status {status}: {}",
                preview(&body, 200)
            ));
        }

        let envelope: TranslationEnvelope = response
            .json()
            .await
            .context("failed to deserialize translation response")?;

        if let Some(code) = envelope.response_status.as_ref().and_then(status_code) {
            if code != 200 {
                return Err(anyhow!("translation envelope reported status {code}"));
            }
        }

        envelope
            .response_data
            .and_then(|data| data.translated_text)
            .ok_or_else(|| anyhow!("translation response missing responseData.translatedText"))
    }
}

fn status_code(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(number) => number.as_u64(),
        serde_json::Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// 失敗しない翻訳アダプタ。
///
/// バックエンドのあらゆる失敗をここでログに記録して吸収し、原文をそのまま返す。
#[derive(Clone)]
pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
}

impl Translator {
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self { backend }
    }

    /// `text` を `source` から `target` へ翻訳する。失敗時は `text` を返す。
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> String {
        if text.trim().is_empty() || source.eq_ignore_ascii_case(target) {
            return text.to_string();
        }

        match self.backend.translate(text, source, target).await {
            Ok(translated) if !translated.trim().is_empty() => {
                debug!(
                    source,
                    target,
                    input_chars = text.chars().count(),
                    output_chars = translated.chars().count(),
                    "segment translated"
                );
                translated
            }
            Ok(_) => {
                warn!(
                    source,
                    target,
                    input_preview = %preview(text, 80),
                    "translation returned empty text; using original"
                );
                text.to_string()
            }
            Err(error) => {
                warn!(
                    source,
                    target,
                    error = %format!("{error:#}"),
                    input_preview = %preview(text, 80),
                    "translation failed; using original"
                );
                text.to_string()
            }
        }
    }
}

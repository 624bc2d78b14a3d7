/// 言語モデル（Ollama互換 `/api/generate`）クライアントと AI アダプタ。
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::util::text::{preview, strip_think_spans};

/// モデルが逐次返すテキスト断片のストリーム。一度だけ消費できる。
pub type TokenStream = BoxStream<'static, Result<String>>;

/// テキスト補完を行う外部言語モデル。
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 応答全体を一度に返す補完。
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 応答を断片ごとに返す補完。
    async fn complete_stream(&self, prompt: &str) -> Result<TokenStream>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Ollama互換エンドポイントのクライアント。
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: Url,
    model: String,
    request_timeout: Duration,
}

impl OllamaClient {
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("failed to build language model client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid language model base URL")?;

        Ok(Self {
            client,
            base_url,
            model: model.into(),
            request_timeout,
        })
    }

    async fn send_generate(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join("api/generate")
            .context("failed to build generate URL")?;

        debug!(
            model = %self.model,
            stream,
            prompt_chars = prompt.chars().count(),
            "sending completion request"
        );

        let mut request = self.client.post(url).json(&GenerateRequest {
            model: &self.model,
            prompt,
            stream,
        });
        // ストリーミングは全体時間ではなく呼び出し側のタイムアウトで打ち切る
        if !stream {
            request = request.timeout(self.request_timeout);
        }

        let response = request
            .send()
            .await
            .context("completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "completion endpoint returned error status {status}: {}",
                preview(&body, 400)
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.send_generate(prompt, false).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .context("failed to deserialize completion response")?;

        info!(
            model = %self.model,
            response_chars = parsed.response.chars().count(),
            "completion received"
        );

        Ok(parsed.response)
    }

    async fn complete_stream(&self, prompt: &str) -> Result<TokenStream> {
        let response = self.send_generate(prompt, true).await?;
        Ok(ndjson_tokens(response.bytes_stream()))
    }

    async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("api/tags")
            .context("failed to build language model health URL")?;

        self.client
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("language model health request failed")?
            .error_for_status()
            .context("language model health endpoint returned error status")?;

        Ok(())
    }
}

struct NdjsonState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

/// 改行区切りJSON（`{"response": "...", "done": bool}`）のバイト列をテキスト断片に変換する。
///
/// `done: true` の行、またはバイト列の終端でストリームを終える。
pub(crate) fn ndjson_tokens<S, B, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = NdjsonState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(newline) = state.buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=newline).collect();
                match parse_stream_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(chunk)) => {
                        state.finished = chunk.done;
                        if chunk.response.is_empty() {
                            continue;
                        }
                        return Some((Ok(chunk.response), state));
                    }
                    Err(error) => {
                        state.finished = true;
                        return Some((Err(error), state));
                    }
                }
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(error)) => {
                    state.finished = true;
                    return Some((
                        Err(anyhow::Error::new(error).context("completion stream interrupted")),
                        state,
                    ));
                }
                None => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    return match parse_stream_line(&rest) {
                        Ok(Some(chunk)) if !chunk.response.is_empty() => {
                            Some((Ok(chunk.response), state))
                        }
                        Ok(_) => None,
                        Err(error) => Some((Err(error), state)),
                    };
                }
            }
        }
    })
    .boxed()
}

fn parse_stream_line(line: &[u8]) -> Result<Option<GenerateResponse>> {
    let text = std::str::from_utf8(line).context("completion stream is not valid UTF-8")?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .context("failed to parse completion stream line")
}

/// パイプラインが利用するAIアダプタ。
///
/// 一括応答からは `<think>` 区間を必ず取り除いてから返す。
#[derive(Clone)]
pub struct AiAdapter {
    model: Arc<dyn LanguageModel>,
}

impl AiAdapter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// # Errors
    /// モデル呼び出しが失敗した場合はエラーを返す。
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let raw = self.model.complete(prompt).await?;
        Ok(strip_think_spans(&raw))
    }

    /// 断片ストリームをそのまま返す。`<think>` 区間は除去されない。
    ///
    /// # Errors
    /// ストリームの開始に失敗した場合はエラーを返す。
    pub async fn ask_streaming(&self, prompt: &str) -> Result<TokenStream> {
        self.model.complete_stream(prompt).await
    }

    /// ストリーミング補完を最後まで読み、`<think>` 区間を除いた全文を返す。
    ///
    /// # Errors
    /// ストリームの開始または途中の読み取りに失敗した場合はエラーを返す。
    pub async fn ask_collected(&self, prompt: &str) -> Result<String> {
        let mut stream = self.ask_streaming(prompt).await?;
        let mut reply = String::new();
        while let Some(token) = stream.next().await {
            reply.push_str(&token?);
        }
        Ok(strip_think_spans(&reply))
    }

    /// # Errors
    /// モデルが応答しない場合はエラーを返す。
    pub async fn health_check(&self) -> Result<()> {
        self.model.health_check().await
    }
}

//! AI選択肢候補の生成。
//!
//! 同期呼び出し元から呼ばれるため、上限付きのワーカープール上で実行し、
//! 全体に壁時計タイムアウトを課す。
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::clients::AiAdapter;
use crate::observability::metrics::Metrics;

use super::extract::extract_options;
use super::prompt::build_options_prompt;
use super::translation::{Direction, LongTextTranslator};
use super::{GenerationError, GenerationResult};

#[derive(Clone)]
pub struct OptionGenerator {
    translator: LongTextTranslator,
    ai: AiAdapter,
    workers: Arc<Semaphore>,
    timeout: Duration,
    max_count: usize,
    metrics: Arc<Metrics>,
}

impl OptionGenerator {
    #[must_use]
    pub fn new(
        translator: LongTextTranslator,
        ai: AiAdapter,
        worker_pool_size: usize,
        timeout: Duration,
        max_count: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            translator,
            ai,
            workers: Arc::new(Semaphore::new(worker_pool_size.max(1))),
            timeout,
            max_count,
            metrics,
        }
    }

    /// `title` に対する選択肢候補を最大 `count` 件生成する。
    ///
    /// 失敗・タイムアウトを含め、結果は常に [`GenerationResult`] で返す。
    pub async fn generate_options(&self, title: &str, count: usize) -> GenerationResult<Vec<String>> {
        self.metrics.option_generations_total.inc();
        let started = Instant::now();

        let result = self.run(title, count).await;

        self.metrics
            .option_generation_duration
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(options) => {
                info!(count = options.len(), "option candidates generated");
                GenerationResult::success(options)
            }
            Err(error) => {
                self.metrics.option_generations_failed.inc();
                if matches!(error, GenerationError::Timeout(_)) {
                    self.metrics.option_generations_timed_out.inc();
                }
                warn!(kind = error.kind(), error = %error, "option generation failed");
                GenerationResult::failure(error.to_string())
            }
        }
    }

    async fn run(&self, title: &str, count: usize) -> Result<Vec<String>, GenerationError> {
        self.validate(title, count)?;

        let pipeline = self.clone();
        let title = title.trim().to_string();
        let mut handle = tokio::spawn(async move {
            let _permit = pipeline
                .workers
                .acquire()
                .await
                .map_err(|error| GenerationError::Worker(error.to_string()))?;
            pipeline.pipeline(&title, count).await
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(GenerationError::Worker(join_error.to_string())),
            Err(_) => {
                // 実行中の呼び出しは破棄する。送信済みのリクエストは相手側で完了しうる
                handle.abort();
                Err(GenerationError::Timeout(self.timeout))
            }
        }
    }

    fn validate(&self, title: &str, count: usize) -> Result<(), GenerationError> {
        if title.trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                "title must not be blank".to_string(),
            ));
        }
        if count == 0 {
            return Err(GenerationError::InvalidInput(
                "count must be at least 1".to_string(),
            ));
        }
        if count > self.max_count {
            return Err(GenerationError::InvalidInput(format!(
                "count must be at most {}",
                self.max_count
            )));
        }
        Ok(())
    }

    async fn pipeline(&self, title: &str, count: usize) -> Result<Vec<String>, GenerationError> {
        let topic = self.translator.translate_long(title, Direction::ToModel).await;
        let prompt = build_options_prompt(&topic, count);

        let reply = self.ai.ask(&prompt).await.map_err(GenerationError::Model)?;
        let extracted = extract_options(&reply, count)?;
        self.metrics
            .option_extraction_tier
            .with_label_values(&[extracted.tier.as_str()])
            .inc();

        let mut options = Vec::with_capacity(extracted.options.len());
        for option in &extracted.options {
            let localized = self
                .translator
                .translate_long(option, Direction::ToSource)
                .await;
            if !localized.is_empty() {
                options.push(localized);
            }
        }

        if options.is_empty() {
            return Err(GenerationError::NoUsableOutput);
        }
        Ok(options)
    }
}

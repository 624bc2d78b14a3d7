use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;

use crate::{
    api,
    clients::{
        AiAdapter, MyMemoryClient, OllamaClient, PollBackendClient, PollBackendConfig, Translator,
        TranslatorConfig,
    },
    config::Config,
    observability::Telemetry,
    pipeline::{GuideGenerator, LongTextTranslator, OptionGenerator},
    scheduler::{DailyCadence, Scheduler},
    store::GuideStore,
    util::retry::RetryConfig,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    ai: AiAdapter,
    poll_backend: Arc<PollBackendClient>,
    option_generator: OptionGenerator,
    scheduler: Scheduler,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.registry.scheduler
    }

    pub(crate) fn option_generator(&self) -> &OptionGenerator {
        &self.registry.option_generator
    }

    pub(crate) fn ai(&self) -> &AiAdapter {
        &self.registry.ai
    }

    pub(crate) fn poll_backend(&self) -> Arc<PollBackendClient> {
        Arc::clone(&self.registry.poll_backend)
    }
}

impl ComponentRegistry {
    /// 構成情報からクライアントと生成パイプラインを組み立てる。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let telemetry = Telemetry::new()?;
        Self::build_with_telemetry(config, telemetry)
    }

    /// 初期化済みの Telemetry を使って組み立てる。
    ///
    /// # Errors
    /// HTTP クライアントの構築に失敗した場合はエラーを返す。
    pub fn build_with_telemetry(config: Config, telemetry: Telemetry) -> Result<Self> {
        let config = Arc::new(config);
        let metrics = telemetry.metrics();

        let model = OllamaClient::new(
            config.llm_base_url(),
            config.llm_model(),
            config.llm_request_timeout(),
        )
        .context("failed to build language model client")?;
        let ai = AiAdapter::new(Arc::new(model));

        let translation_backend = MyMemoryClient::new(TranslatorConfig {
            base_url: config.translator_base_url().to_string(),
            timeout: config.translator_timeout(),
        })
        .context("failed to build translator client")?;
        let translator = LongTextTranslator::new(
            Translator::new(Arc::new(translation_backend)),
            config.source_language(),
            config.model_language(),
            config.translation_chunk_max_chars().get(),
            config.translator_max_concurrency().get(),
        );

        let poll_backend = Arc::new(
            PollBackendClient::new(PollBackendConfig {
                base_url: config.poll_backend_base_url().to_string(),
                connect_timeout: config.poll_backend_connect_timeout(),
                total_timeout: config.poll_backend_total_timeout(),
                service_token: config.poll_backend_service_token().map(str::to_string),
                retry: RetryConfig::new(
                    config.http_max_retries(),
                    config.http_backoff_base_ms(),
                    config.http_backoff_cap_ms(),
                ),
            })
            .context("failed to build poll-backend client")?,
        );
        let store: Arc<dyn GuideStore> = poll_backend.clone();

        let option_generator = OptionGenerator::new(
            translator.clone(),
            ai.clone(),
            config.llm_max_concurrency().get(),
            config.option_generation_timeout(),
            config.option_max_count().get(),
            Arc::clone(&metrics),
        );
        let guide_generator =
            GuideGenerator::new(translator, ai.clone(), Arc::clone(&store), Arc::clone(&metrics));
        let scheduler = Scheduler::new(
            guide_generator,
            store,
            config.guide_generation_timeout(),
            metrics,
        );

        Ok(Self {
            config,
            telemetry,
            ai,
            poll_backend,
            option_generator,
            scheduler,
        })
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn option_generator(&self) -> &OptionGenerator {
        &self.option_generator
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// 設定された日次スイープの発火スケジュール。
    ///
    /// # Errors
    /// オフセットまたは時刻が範囲外の場合はエラーを返す。
    pub fn sweep_cadence(&self) -> Result<DailyCadence> {
        DailyCadence::new(
            self.config.guide_sweep_utc_offset_hours(),
            self.config.guide_sweep_hour(),
            self.config.guide_sweep_minute(),
        )
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}

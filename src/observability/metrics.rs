/// Prometheusメトリクス定義。
use prometheus::{
    Counter, CounterVec, Histogram, Registry, register_counter_vec_with_registry,
    register_counter_with_registry, register_histogram_with_registry,
};
use std::fmt;
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Clone)]
pub struct Metrics {
    // 選択肢候補生成
    pub option_generations_total: Counter,
    pub option_generations_failed: Counter,
    pub option_generations_timed_out: Counter,
    pub option_extraction_tier: CounterVec,

    // ガイド生成
    pub guides_generated: Counter,
    pub guides_failed: Counter,
    pub sweeps_total: Counter,

    // ヒストグラム
    pub option_generation_duration: Histogram,
    pub guide_generation_duration: Histogram,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            option_generations_total: register_counter_with_registry!(
                "poll_guide_option_generations_total",
                "Total number of option-candidate generation requests",
                registry
            )?,
            option_generations_failed: register_counter_with_registry!(
                "poll_guide_option_generations_failed_total",
                "Option-candidate generations that returned a failure result",
                registry
            )?,
            option_generations_timed_out: register_counter_with_registry!(
                "poll_guide_option_generations_timed_out_total",
                "Option-candidate generations abandoned after the timeout",
                registry
            )?,
            option_extraction_tier: register_counter_vec_with_registry!(
                "poll_guide_option_extraction_tier_total",
                "Extraction tier that completed the option list",
                &["tier"],
                registry
            )?,
            guides_generated: register_counter_with_registry!(
                "poll_guide_guides_generated_total",
                "Total number of guides generated and persisted",
                registry
            )?,
            guides_failed: register_counter_with_registry!(
                "poll_guide_guides_failed_total",
                "Total number of guide generations that failed",
                registry
            )?,
            sweeps_total: register_counter_with_registry!(
                "poll_guide_sweeps_total",
                "Total number of guide sweeps started",
                registry
            )?,
            option_generation_duration: register_histogram_with_registry!(
                "poll_guide_option_generation_duration_seconds",
                "Duration of option-candidate generation",
                registry
            )?,
            guide_generation_duration: register_histogram_with_registry!(
                "poll_guide_guide_generation_duration_seconds",
                "Duration of a single guide generation",
                registry
            )?,
        })
    }

    /// テスト用に専用レジストリへ登録したメトリクスを返す。
    #[cfg(test)]
    pub(crate) fn for_tests() -> Arc<Self> {
        Arc::new(Self::new(Arc::new(Registry::new())).expect("metrics register"))
    }
}

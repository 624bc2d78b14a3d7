//! 区間分割と翻訳アダプタを組み合わせて長文を翻訳する。
//!
//! 外部翻訳エンドポイントには入力長の上限があるため、長文は必ずここを経由させる。
use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::clients::Translator;
use crate::language_detection::detect_lang;

use super::chunker;

/// 翻訳の向き。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 利用者の言語からモデルの作業言語へ。
    ToModel,
    /// モデルの作業言語から利用者の言語へ。
    ToSource,
}

#[derive(Clone)]
pub struct LongTextTranslator {
    translator: Translator,
    source_language: String,
    model_language: String,
    chunk_max_chars: usize,
    concurrency: usize,
}

impl LongTextTranslator {
    #[must_use]
    pub fn new(
        translator: Translator,
        source_language: impl Into<String>,
        model_language: impl Into<String>,
        chunk_max_chars: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            translator,
            source_language: source_language.into(),
            model_language: model_language.into(),
            chunk_max_chars: chunk_max_chars.max(1),
            concurrency: concurrency.max(1),
        }
    }

    #[must_use]
    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    #[must_use]
    pub fn model_language(&self) -> &str {
        &self.model_language
    }

    fn languages(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::ToModel => (&self.source_language, &self.model_language),
            Direction::ToSource => (&self.model_language, &self.source_language),
        }
    }

    fn should_skip(&self, text: &str, direction: Direction) -> bool {
        if text.trim().is_empty()
            || self
                .source_language
                .eq_ignore_ascii_case(&self.model_language)
        {
            return true;
        }

        if direction == Direction::ToModel {
            let (detected, confidence) = detect_lang(text);
            if detected.matches_tag(&self.model_language) {
                debug!(
                    confidence,
                    model_language = %self.model_language,
                    "text already in model language; skipping translation"
                );
                return true;
            }
        }

        false
    }

    /// `text` を区間ごとに翻訳し、半角スペース1つで連結して返す。
    ///
    /// 区間の翻訳は並行に行うが、連結順は元の順序を保つ。
    /// 区間単位の翻訳失敗は原文で置き換えられるため、このメソッドは失敗しない。
    pub async fn translate_long(&self, text: &str, direction: Direction) -> String {
        if self.should_skip(text, direction) {
            return text.trim().to_string();
        }

        let (source, target) = self.languages(direction);
        let chunks = chunker::split(text, self.chunk_max_chars);
        let chunk_count = chunks.len();

        let translated: Vec<String> = stream::iter(chunks)
            .map(|chunk| async move { self.translator.translate(&chunk, source, target).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        debug!(
            ?direction,
            chunk_count,
            chars = text.chars().count(),
            "long text translated"
        );

        translated.join(" ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::TranslationBackend;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// 受け取った区間を記録し、`[target]` を付けて返す。
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, String, String)>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<(String, String, String)> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl TranslationBackend for RecordingBackend {
        async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((text.to_string(), source.to_string(), target.to_string()));
            // 先頭区間ほど遅く返し、並行実行でも順序が保たれることを確認する
            if text.starts_with("First") {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            if self.fail_on.is_some_and(|needle| text.contains(needle)) {
                bail!("translation quota exceeded");
            }
            Ok(format!("[{target}] {text}"))
        }
    }

    fn orchestrator(backend: Arc<RecordingBackend>, max: usize) -> LongTextTranslator {
        LongTextTranslator::new(Translator::new(backend), "ko", "en", max, 4)
    }

    #[tokio::test]
    async fn translates_chunks_in_order() {
        let backend = Arc::new(RecordingBackend::default());
        let translator = orchestrator(backend.clone(), 20);

        let result = translator
            .translate_long("First sentence. Second one here. Third.", Direction::ToSource)
            .await;

        assert_eq!(
            result,
            "[ko] First sentence. [ko] Second one here. [ko] Third."
        );
        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, source, target)| source == "en" && target == "ko"));
    }

    #[tokio::test]
    async fn failed_chunks_fall_back_to_original_text() {
        let backend = Arc::new(RecordingBackend {
            fail_on: Some("Second"),
            ..RecordingBackend::default()
        });
        let translator = orchestrator(backend, 20);

        let result = translator
            .translate_long("First sentence. Second one here.", Direction::ToSource)
            .await;

        assert_eq!(result, "[ko] First sentence. Second one here.");
    }

    #[tokio::test]
    async fn skips_when_languages_are_equal() {
        let backend = Arc::new(RecordingBackend::default());
        let translator = LongTextTranslator::new(Translator::new(backend.clone()), "en", "EN", 450, 1);

        let result = translator
            .translate_long("  Already English.  ", Direction::ToModel)
            .await;

        assert_eq!(result, "Already English.");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn skips_to_model_when_text_is_already_in_model_language() {
        let backend = Arc::new(RecordingBackend::default());
        let translator = orchestrator(backend.clone(), 450);

        let result = translator
            .translate_long(
                "Which travel destination would you recommend for a summer vacation?",
                Direction::ToModel,
            )
            .await;

        assert!(result.starts_with("Which travel destination"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn translates_source_language_text_to_model() {
        let backend = Arc::new(RecordingBackend::default());
        let translator = orchestrator(backend.clone(), 450);

        let result = translator
            .translate_long("가장 좋아하는 여행지는 어디인가요?", Direction::ToModel)
            .await;

        assert_eq!(result, "[en] 가장 좋아하는 여행지는 어디인가요?");
        assert_eq!(backend.calls()[0].1, "ko");
    }

    #[tokio::test]
    async fn blank_text_is_not_sent() {
        let backend = Arc::new(RecordingBackend::default());
        let translator = orchestrator(backend.clone(), 450);

        assert_eq!(translator.translate_long("   ", Direction::ToSource).await, "");
        assert!(backend.calls().is_empty());
    }
}

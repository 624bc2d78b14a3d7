//! 締め切り済み投票からガイド（タイトル・本文）を合成し、永続化コラボレーターへ渡す。
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::clients::AiAdapter;
use crate::observability::metrics::Metrics;
use crate::store::{GuideRecord, GuideStore, GuideType, VoteAggregate};

use super::extract::{GuideDraft, extract_title_content};
use super::prompt::{GuidePromptInput, build_guide_prompt, writing_style_for};
use super::translation::{Direction, LongTextTranslator};
use super::GenerationError;

/// 得票率を小数点以下1桁で整形する。総数が0のときは `0.0%`。
///
/// 小数点は常に `.` を使う。
#[must_use]
pub fn format_percentage(count: u64, total: u64) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    #[allow(clippy::cast_precision_loss)]
    let percentage = count as f64 / total as f64 * 100.0;
    format!("{percentage:.1}%")
}

/// 選択肢ごとに「選択肢 — xx.x%」の行を作る。並びは入力順のまま。
///
/// `labels` は `vote.options` と同じ順の表示名（モデル作業言語へ翻訳済みのもの）。
#[must_use]
pub fn option_block(labels: &[String], vote: &VoteAggregate) -> String {
    let total = vote.total_votes();
    labels
        .iter()
        .zip(&vote.options)
        .map(|(label, option)| {
            format!("{} — {}", label.trim(), format_percentage(option.count, total))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone)]
pub struct GuideGenerator {
    translator: LongTextTranslator,
    ai: AiAdapter,
    store: Arc<dyn GuideStore>,
    metrics: Arc<Metrics>,
}

impl GuideGenerator {
    #[must_use]
    pub fn new(
        translator: LongTextTranslator,
        ai: AiAdapter,
        store: Arc<dyn GuideStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            translator,
            ai,
            store,
            metrics,
        }
    }

    /// 1件の投票についてガイドを生成し、保存したレコードを返す。
    ///
    /// # Errors
    /// モデル呼び出しの失敗、応答形式の不備、保存の失敗を [`GenerationError`] で返す。
    /// 翻訳の失敗は原文で代替されるためエラーにならない。
    #[instrument(skip_all, fields(vote_id = vote.vote_id))]
    pub async fn generate_guide(&self, vote: &VoteAggregate) -> Result<GuideRecord, GenerationError> {
        let started = Instant::now();
        let result = self.generate(vote).await;
        self.metrics
            .guide_generation_duration
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(record) => {
                self.metrics.guides_generated.inc();
                Ok(record)
            }
            Err(error) => {
                self.metrics.guides_failed.inc();
                Err(error)
            }
        }
    }

    async fn generate(&self, vote: &VoteAggregate) -> Result<GuideRecord, GenerationError> {
        let top = vote.top_option_index().ok_or_else(|| {
            GenerationError::InvalidInput(format!("vote {} has no options", vote.vote_id))
        })?;

        let draft = self.draft(vote, top).await?;
        let title = self
            .translator
            .translate_long(&draft.title, Direction::ToSource)
            .await;
        let content = self
            .translator
            .translate_long(&draft.content, Direction::ToSource)
            .await;

        let record = GuideRecord {
            vote_id: vote.vote_id,
            title,
            content,
            category: vote.category.clone(),
            guide_type: GuideType::Ai,
            created_at: Utc::now(),
        };

        self.store
            .save_guide(&record)
            .await
            .map_err(GenerationError::Persistence)?;

        info!(
            title_chars = record.title.chars().count(),
            content_chars = record.content.chars().count(),
            "guide generated"
        );
        Ok(record)
    }

    async fn to_model(&self, text: &str) -> String {
        self.translator
            .translate_long(text, Direction::ToModel)
            .await
    }

    /// モデル作業言語でのタイトル・本文を得る。
    async fn draft(&self, vote: &VoteAggregate, top: usize) -> Result<GuideDraft, GenerationError> {
        let vote_title = self.to_model(&vote.title).await;
        let mut labels = Vec::with_capacity(vote.options.len());
        for option in &vote.options {
            labels.push(self.to_model(option.content.trim()).await);
        }
        let (tail_question, tail_answers) = match &vote.tail {
            Some(tail) => {
                let question = self.to_model(&tail.question).await;
                let mut answers = Vec::with_capacity(tail.answers.len());
                for answer in &tail.answers {
                    let translated = self.to_model(answer).await;
                    if !translated.is_empty() {
                        answers.push(translated);
                    }
                }
                (question, answers)
            }
            None => (String::new(), Vec::new()),
        };

        let prompt = build_guide_prompt(&GuidePromptInput {
            vote_title: &vote_title,
            top_option: &labels[top],
            option_block: &option_block(&labels, vote),
            tail_question: &tail_question,
            tail_answers: &tail_answers,
            style: writing_style_for(&vote.category),
        });
        debug!(prompt_chars = prompt.chars().count(), "guide prompt built");

        let reply = self
            .ai
            .ask_collected(&prompt)
            .await
            .map_err(GenerationError::Model)?;

        Ok(extract_title_content(&reply)?)
    }
}

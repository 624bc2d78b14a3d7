//! 投票結果からガイド本文とAI選択肢候補を合成するパイプライン。
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod chunker;
pub mod extract;
pub mod guide;
pub mod options;
pub mod prompt;
pub mod translation;

pub use extract::{ExtractionTier, GuideDraft};
pub use guide::{GuideGenerator, format_percentage};
pub use options::OptionGenerator;
pub use translation::{Direction, LongTextTranslator};

/// ガイド応答の必須ラベルが見つからない、または順序が不正な場合のエラー。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("model reply is missing the `{0}` marker")]
    MissingMarker(&'static str),
    #[error("`Guide Content:` marker appears before `Guide Title:`")]
    MarkerOrder,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("language model call failed: {0:#}")]
    Model(#[source] anyhow::Error),
    #[error("generation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("model produced no usable output")]
    NoUsableOutput,
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("failed to persist guide: {0:#}")]
    Persistence(#[source] anyhow::Error),
    #[error("generation worker stopped unexpectedly: {0}")]
    Worker(String),
}

impl GenerationError {
    /// メトリクスやログで使う短い分類名。
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Model(_) => "model",
            Self::Timeout(_) => "timeout",
            Self::NoUsableOutput => "no_usable_output",
            Self::Format(_) => "format",
            Self::Persistence(_) => "persistence",
            Self::Worker(_) => "worker",
        }
    }
}

/// 同期呼び出し元に返す生成結果。
///
/// 失敗時もペイロードは空値で埋まっており、欠落することはない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult<T> {
    pub success: bool,
    pub message: String,
    pub payload: T,
}

impl<T: Default> GenerationResult<T> {
    #[must_use]
    pub fn success(payload: T) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            payload,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: T::default(),
        }
    }
}

impl<T: Default> From<Result<T, GenerationError>> for GenerationResult<T> {
    fn from(result: Result<T, GenerationError>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(error) => Self::failure(error.to_string()),
        }
    }
}

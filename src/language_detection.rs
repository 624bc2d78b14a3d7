//! `lingua`ベースの言語判定ラッパ。
//!
//! English/Korean/Japaneseに限定して言語を検出し、
//! 信頼度が低い場合は`Unknown`を返すことで不要な翻訳スキップを防ぐ。
use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use once_cell::sync::Lazy;

static DETECTOR: Lazy<LanguageDetector> = Lazy::new(|| {
    LanguageDetectorBuilder::from_languages(&[
        Language::English,
        Language::Korean,
        Language::Japanese,
    ])
    .with_minimum_relative_distance(0.01)
    .build()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedLanguage {
    English,
    Korean,
    Japanese,
    Unknown,
}

impl DetectedLanguage {
    /// ISO 639-1 コード。`Unknown` は `None`。
    #[must_use]
    pub fn iso_code(self) -> Option<&'static str> {
        match self {
            Self::English => Some("en"),
            Self::Korean => Some("ko"),
            Self::Japanese => Some("ja"),
            Self::Unknown => None,
        }
    }

    /// 言語タグ（`en`, `en-US` など）が同じ言語を指すかどうか。
    #[must_use]
    pub fn matches_tag(self, tag: &str) -> bool {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        self.iso_code()
            .is_some_and(|code| code.eq_ignore_ascii_case(primary))
    }
}

/// 環境変数`GUIDE_LANG_DETECT_MIN_CHARS`で設定可能（デフォルト: 12）
fn min_chars() -> usize {
    std::env::var("GUIDE_LANG_DETECT_MIN_CHARS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(12)
}

/// 環境変数`GUIDE_LANG_DETECT_MIN_CONFIDENCE`で設定可能（デフォルト: 0.6）
fn min_confidence() -> f64 {
    std::env::var("GUIDE_LANG_DETECT_MIN_CONFIDENCE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.6)
}

/// テキストから言語を検出する。
///
/// # Returns
/// `(DetectedLanguage, confidence)` のタプル。
/// 文字数が少ない、または信頼度が低い場合は`Unknown`を返す。
#[must_use]
pub fn detect_lang(text: &str) -> (DetectedLanguage, f64) {
    let trimmed = text.trim();
    if trimmed.chars().count() < min_chars() {
        return (DetectedLanguage::Unknown, 0.0);
    }

    let Some(language) = DETECTOR.detect_language_of(trimmed) else {
        return (DetectedLanguage::Unknown, 0.0);
    };

    let confidence = DETECTOR
        .compute_language_confidence_values(trimmed)
        .iter()
        .find(|(candidate, _)| *candidate == language)
        .map_or(0.0, |(_, confidence)| *confidence);

    if confidence < min_confidence() {
        return (DetectedLanguage::Unknown, confidence);
    }

    let detected = match language {
        Language::English => DetectedLanguage::English,
        Language::Korean => DetectedLanguage::Korean,
        Language::Japanese => DetectedLanguage::Japanese,
        #[allow(unreachable_patterns)]
        _ => DetectedLanguage::Unknown,
    };

    (detected, confidence)
}

//! 信頼できないモデル応答から選択肢リストやタイトル／本文を取り出す。
//!
//! 選択肢抽出は「番号付き行 → 緩い行フィルタ → 既定値での補完」の順に段を試す。
//! 各段は前段までの候補を受け取り、足りない分だけを追加する。
use serde::{Deserialize, Serialize};

use super::{FormatError, GenerationError};

pub const TITLE_MARKER: &str = "Guide Title:";
pub const CONTENT_MARKER: &str = "Guide Content:";

/// モデルが十分な候補を返さなかったときの補完用リスト。
pub const DEFAULT_OPTIONS: [&str; 10] = [
    "Paris",
    "Tokyo",
    "New York",
    "London",
    "Rome",
    "Barcelona",
    "Sydney",
    "Bangkok",
    "Istanbul",
    "Seoul",
];

/// 最終的な候補リストを満たすのに使われた最後の段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    Numbered,
    Loose,
    Defaults,
}

impl ExtractionTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numbered => "numbered",
            Self::Loose => "loose",
            Self::Defaults => "defaults",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedOptions {
    pub options: Vec<String>,
    pub tier: ExtractionTier,
}

type TierFn = fn(&str, usize, &mut Vec<String>);

/// 抽出段の順序付きリスト。モデル応答に由来する段のみ。
const MODEL_TIERS: [(ExtractionTier, TierFn); 2] = [
    (ExtractionTier::Numbered, numbered_tier),
    (ExtractionTier::Loose, loose_tier),
];

/// `reply` から最大 `expected` 件の選択肢を取り出す。
///
/// # Errors
/// モデル応答から候補が1件も得られない場合は [`GenerationError::NoUsableOutput`] を返す。
/// 既定値による補完はモデルが何かしら回答した場合にのみ行う。
pub fn extract_options(reply: &str, expected: usize) -> Result<ExtractedOptions, GenerationError> {
    if expected == 0 {
        return Err(GenerationError::InvalidInput(
            "requested option count must be positive".to_string(),
        ));
    }

    let mut candidates = Vec::with_capacity(expected);
    let mut tier = ExtractionTier::Numbered;

    for (current, apply) in MODEL_TIERS {
        if candidates.len() >= expected {
            break;
        }
        tier = current;
        apply(reply, expected, &mut candidates);
    }

    if candidates.is_empty() {
        return Err(GenerationError::NoUsableOutput);
    }

    if candidates.len() < expected {
        tier = ExtractionTier::Defaults;
        defaults_tier(expected, &mut candidates);
    }

    candidates.truncate(expected);
    Ok(ExtractedOptions {
        options: candidates,
        tier,
    })
}

fn numbered_tier(reply: &str, _expected: usize, candidates: &mut Vec<String>) {
    for line in reply.lines() {
        if let Some(option) = strip_number_prefix(line.trim()) {
            push_unique(candidates, option);
        }
    }
}

fn loose_tier(reply: &str, expected: usize, candidates: &mut Vec<String>) {
    for line in reply.lines() {
        if candidates.len() >= expected {
            break;
        }
        let line = strip_list_marker(line.trim());
        if line.ends_with(':') {
            continue;
        }
        push_unique(candidates, line);
    }
}

fn defaults_tier(expected: usize, candidates: &mut Vec<String>) {
    for default in DEFAULT_OPTIONS {
        if candidates.len() >= expected {
            break;
        }
        push_unique(candidates, default);
    }
}

/// `12. foo` の形式なら `foo` を返す。
fn strip_number_prefix(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix('.').map(str::trim)
}

/// 箇条書き記号や番号を取り除く。
fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = strip_number_prefix(line) {
        return rest;
    }
    line.trim_start_matches(['-', '*', '•']).trim()
}

/// 空文字・疑問文・大文字小文字違いの重複を除いて追加する。
fn push_unique(candidates: &mut Vec<String>, option: &str) {
    let option = option.trim();
    if option.is_empty() || option.ends_with('?') {
        return;
    }
    let lowered = option.to_lowercase();
    if candidates
        .iter()
        .any(|existing| existing.to_lowercase() == lowered)
    {
        return;
    }
    candidates.push(option.to_string());
}

/// ガイド応答から取り出したタイトルと本文。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideDraft {
    pub title: String,
    pub content: String,
}

/// `Guide Title:` と `Guide Content:` の間をタイトル、それ以降を本文として取り出す。
///
/// # Errors
/// どちらかのラベルが無い、または本文ラベルが先に現れる場合は [`FormatError`] を返す。
pub fn extract_title_content(reply: &str) -> Result<GuideDraft, FormatError> {
    let title_at = reply
        .find(TITLE_MARKER)
        .ok_or(FormatError::MissingMarker(TITLE_MARKER))?;
    let content_at = reply
        .find(CONTENT_MARKER)
        .ok_or(FormatError::MissingMarker(CONTENT_MARKER))?;

    let title_start = title_at + TITLE_MARKER.len();
    if content_at < title_start {
        return Err(FormatError::MarkerOrder);
    }

    Ok(GuideDraft {
        title: clean_section(&reply[title_start..content_at]),
        content: clean_section(&reply[content_at + CONTENT_MARKER.len()..]),
    })
}

// Models often wrap section bodies in markdown emphasis.
fn clean_section(section: &str) -> String {
    section
        .trim_matches(|c: char| c == '*' || c.is_whitespace())
        .to_string()
}

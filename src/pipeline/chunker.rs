//! 文境界で長文を上限サイズ以下の区間に分割する。
use once_cell::sync::Lazy;
use regex::Regex;

/// 文末記号の直後の空白。記号は直前の文に残る。
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("compile sentence break regex"));

/// 文末記号を保持したまま、テキストを文単位の断片に分割する。空の断片は含まない。
#[must_use]
pub fn sentences(text: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BREAK.find_iter(text) {
        // boundary.start() は文末記号の位置（1バイトのASCII）
        let end = boundary.start() + 1;
        push_fragment(&mut fragments, &text[start..end]);
        start = boundary.end();
    }
    push_fragment(&mut fragments, &text[start..]);

    fragments
}

fn push_fragment<'a>(fragments: &mut Vec<&'a str>, fragment: &'a str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        fragments.push(trimmed);
    }
}

/// 文断片を`max_chars`文字以下のまとまりに詰めていく遅延イテレータ。
///
/// 1文だけで上限を超える場合は切り詰めず、その文を単独の区間として返す。
#[derive(Debug, Clone)]
pub struct ChunkIter<'a> {
    fragments: std::vec::IntoIter<&'a str>,
    pending: Option<&'a str>,
    max_chars: usize,
}

impl<'a> ChunkIter<'a> {
    #[must_use]
    pub fn new(text: &'a str, max_chars: usize) -> Self {
        Self {
            fragments: sentences(text).into_iter(),
            pending: None,
            max_chars,
        }
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut buffer = String::new();
        let mut buffer_chars = 0;

        while let Some(fragment) = self.pending.take().or_else(|| self.fragments.next()) {
            let fragment_chars = fragment.chars().count();
            if buffer.is_empty() {
                buffer.push_str(fragment);
                buffer_chars = fragment_chars;
                continue;
            }

            if buffer_chars + 1 + fragment_chars > self.max_chars {
                self.pending = Some(fragment);
                break;
            }

            buffer.push(' ');
            buffer.push_str(fragment);
            buffer_chars += 1 + fragment_chars;
        }

        (!buffer.is_empty()).then_some(buffer)
    }
}

/// `text`を`max_chars`文字以下の区間に分割する。空白のみの入力は空の列になる。
#[must_use]
pub fn split(text: &str, max_chars: usize) -> Vec<String> {
    ChunkIter::new(text, max_chars).collect()
}

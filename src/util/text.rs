/// テキスト処理ユーティリティ。
///
/// モデル出力の `<think>` 区間除去と、ログ用プレビューを提供します。
const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// モデル応答から `<think>...</think>` 区間を取り除く。
///
/// タグの大文字小文字は区別しない。区間は改行を跨いでよく、複数・入れ子にも対応する。
/// 閉じタグのない `<think>` は末尾までを思考区間として扱い、対応する開始タグのない
/// `</think>` はタグのみを削除する。
#[must_use]
pub fn strip_think_spans(text: &str) -> String {
    // ASCII小文字化はバイト位置を変えないので、元テキストのスライスにそのまま使える
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut depth = 0_usize;
    let mut cursor = 0;

    loop {
        let next_open = lower[cursor..].find(THINK_OPEN).map(|i| i + cursor);
        let next_close = lower[cursor..].find(THINK_CLOSE).map(|i| i + cursor);

        let (position, opens) = match (next_open, next_close) {
            (None, None) => break,
            (Some(open), None) => (open, true),
            (None, Some(close)) => (close, false),
            (Some(open), Some(close)) => {
                if open < close {
                    (open, true)
                } else {
                    (close, false)
                }
            }
        };

        if depth == 0 {
            out.push_str(&text[cursor..position]);
        }

        if opens {
            depth += 1;
            cursor = position + THINK_OPEN.len();
        } else {
            depth = depth.saturating_sub(1);
            cursor = position + THINK_CLOSE.len();
        }
    }

    if depth == 0 {
        out.push_str(&text[cursor..]);
    }

    out.trim().to_string()
}

/// ログ出力用に改行を潰し、`limit` 文字で切り詰める。
#[must_use]
pub fn preview(input: &str, limit: usize) -> String {
    let cleaned = input.replace(['\n', '\r'], " ");
    let mut chars = cleaned.chars();
    let mut out: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

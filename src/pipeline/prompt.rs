//! モデルへの指示文を組み立てる純粋関数群。
//!
//! 同じ入力からは常に同じ文字列を返し、ネットワークや副作用を持たない。

/// 選択肢候補生成用のプロンプト。
///
/// 厳密な番号付きリスト形式を要求し、短い（1〜5語）非疑問文の回答のみを許可する。
#[must_use]
pub fn build_options_prompt(topic: &str, count: usize) -> String {
    format!(
        r#"You are helping a user create a poll.
Suggest exactly {count} answer options for the poll topic below.

Poll topic: "{topic}"

Rules:
- Each option must be a direct, concrete answer to the topic.
- Each option must be short: 1 to 5 words.
- Never write a question. Options must not end with "?".
- Do not add explanations, headings, or any text before or after the list.
- Answer ONLY with a numbered list in exactly this format: "<number>. <option>", one option per line.

Example for the topic "Favorite season" with 3 options:
1. Spring
2. Summer
3. Autumn

Now write {count} options for "{topic}":"#
    )
}

/// ガイド生成プロンプトに埋め込む値。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidePromptInput<'a> {
    pub vote_title: &'a str,
    pub top_option: &'a str,
    /// 呼び出し側で整形済みの「選択肢 — xx.x%」行。
    pub option_block: &'a str,
    pub tail_question: &'a str,
    pub tail_answers: &'a [String],
    pub style: &'a str,
}

/// ガイド本文生成用のプロンプト。応答には `Guide Title:` と `Guide Content:` の2節を要求する。
#[must_use]
pub fn build_guide_prompt(input: &GuidePromptInput<'_>) -> String {
    let answers = if input.tail_answers.is_empty() {
        "- (no answers were submitted)".to_string()
    } else {
        input
            .tail_answers
            .iter()
            .map(|answer| format!("- {}", answer.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let tail_question = if input.tail_question.trim().is_empty() {
        "(no follow-up question)"
    } else {
        input.tail_question.trim()
    };

    format!(
        r"You are an editor who writes short, helpful guides from poll results.

Poll title: {title}
Most chosen option: {top}

Vote distribution:
{options}

Follow-up question: {tail_question}
Respondent answers:
{answers}

Write a guide for people interested in the most chosen option, in a {style} writing style.
Use the vote distribution and the respondent answers as supporting material.
Do not invent statistics that are not listed above.

Return your answer in exactly two labeled sections and nothing else:
Guide Title:
<a concise title>

Guide Content:
<the guide text, a few short paragraphs>",
        title = input.vote_title.trim(),
        top = input.top_option.trim(),
        options = input.option_block,
        style = input.style.trim(),
    )
}

/// 投票カテゴリから文体タグを決める。未知のカテゴリは `informative`。
#[must_use]
pub fn writing_style_for(category: &str) -> &'static str {
    match category.trim().to_ascii_lowercase().as_str() {
        "travel" | "trip" | "여행" => "friendly travel blog",
        "food" | "restaurant" | "cooking" | "음식" => "warm food column",
        "lifestyle" | "fashion" | "beauty" | "라이프스타일" => "casual lifestyle magazine",
        "tech" | "technology" | "it" | "기술" => "clear technical review",
        "health" | "fitness" | "sports" | "건강" | "운동" => "encouraging coaching",
        "entertainment" | "movie" | "music" | "game" | "엔터테인먼트" => "lively entertainment news",
        "education" | "study" | "교육" => "patient tutoring",
        _ => "informative",
    }
}

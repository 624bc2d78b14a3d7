use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 投票選択肢ごとの得票数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub content: String,
    pub count: u64,
}

/// 投票後の追加質問（テール）とその自由回答。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailFollowUp {
    pub question: String,
    #[serde(default)]
    pub answers: Vec<String>,
}

/// ガイド生成の入力となる締め切り済み投票の集計。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAggregate {
    pub vote_id: i64,
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub options: Vec<OptionTally>,
    #[serde(default)]
    pub tail: Option<TailFollowUp>,
}

impl VoteAggregate {
    #[must_use]
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|option| option.count).sum()
    }

    /// 最多得票の選択肢。同数の場合は先に並んでいるものを返す。
    #[must_use]
    pub fn top_option(&self) -> Option<&OptionTally> {
        self.top_option_index().map(|index| &self.options[index])
    }

    /// [`Self::top_option`] の `options` 内での位置。
    #[must_use]
    pub fn top_option_index(&self) -> Option<usize> {
        self.options
            .iter()
            .enumerate()
            .reduce(|best, candidate| if candidate.1.count > best.1.count { candidate } else { best })
            .map(|(index, _)| index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuideType {
    Ai,
}

/// 永続化コラボレーターに引き渡す完成済みガイド。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideRecord {
    pub vote_id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(rename = "type")]
    pub guide_type: GuideType,
    pub created_at: DateTime<Utc>,
}

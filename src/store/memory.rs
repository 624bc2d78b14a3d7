use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;

use super::{GuideRecord, GuideStore, VoteAggregate};

/// プロセス内で完結する `GuideStore`（テスト・ローカル実行用）。
///
/// 保存されたガイドの投票は以後 `pending_votes` から除外される。
#[derive(Debug, Default)]
pub struct MemoryGuideStore {
    votes: Mutex<Vec<VoteAggregate>>,
    guides: Mutex<Vec<GuideRecord>>,
}

impl MemoryGuideStore {
    #[must_use]
    pub fn new(votes: Vec<VoteAggregate>) -> Self {
        Self {
            votes: Mutex::new(votes),
            guides: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn guides(&self) -> Vec<GuideRecord> {
        self.guides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl GuideStore for MemoryGuideStore {
    async fn pending_votes(&self) -> Result<Vec<VoteAggregate>> {
        let guided: Vec<i64> = self
            .guides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|guide| guide.vote_id)
            .collect();

        Ok(self
            .votes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|vote| !guided.contains(&vote.vote_id))
            .cloned()
            .collect())
    }

    async fn save_guide(&self, guide: &GuideRecord) -> Result<()> {
        self.guides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(guide.clone());
        Ok(())
    }
}

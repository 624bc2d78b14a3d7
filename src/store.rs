//! 永続化コラボレーターとの境界。
//!
//! ワーカー自身は何も保存しない。締め切られた投票の集計を受け取り、完成したガイドを引き渡すだけ。
pub mod memory;
pub mod models;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryGuideStore;
pub use models::{GuideRecord, GuideType, OptionTally, TailFollowUp, VoteAggregate};

#[async_trait]
pub trait GuideStore: Send + Sync {
    /// ガイド未生成の締め切り済み投票を返す。
    async fn pending_votes(&self) -> Result<Vec<VoteAggregate>>;

    async fn save_guide(&self, guide: &GuideRecord) -> Result<()>;
}

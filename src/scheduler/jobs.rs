use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::observability::metrics::Metrics;
use crate::pipeline::{GenerationError, GuideGenerator};
use crate::store::GuideStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepContext {
    pub sweep_id: Uuid,
}

impl SweepContext {
    #[must_use]
    pub fn new(sweep_id: Uuid) -> Self {
        Self { sweep_id }
    }
}

/// 1回のスイープで処理した投票数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub generated: usize,
    pub failed: usize,
}

/// 実行中のスイープが保持する排他権。ドロップで解放される。
#[derive(Debug)]
pub struct SweepPermit {
    _guard: OwnedMutexGuard<()>,
}

/// 締め切り済み投票のガイドを一括生成する。
///
/// 同時に走るスイープは1つだけ。クローン間で排他を共有する。
#[derive(Clone)]
pub struct Scheduler {
    guide_generator: GuideGenerator,
    store: Arc<dyn GuideStore>,
    item_timeout: Duration,
    metrics: Arc<Metrics>,
    sweep_lock: Arc<Mutex<()>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        guide_generator: GuideGenerator,
        store: Arc<dyn GuideStore>,
        item_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            guide_generator,
            store,
            item_timeout,
            metrics,
            sweep_lock: Arc::new(Mutex::new(())),
        }
    }

    /// スイープ中でなければ排他権を取得する。実行中なら `None`。
    #[must_use]
    pub fn try_acquire_sweep(&self) -> Option<SweepPermit> {
        Arc::clone(&self.sweep_lock)
            .try_lock_owned()
            .ok()
            .map(|guard| SweepPermit { _guard: guard })
    }

    /// 実行中のスイープがあれば終わるまで待ってから、ガイド未作成の投票をすべて処理する。
    ///
    /// # Errors
    /// 対象投票の一覧取得に失敗した場合のみエラーを返す。
    pub async fn run_guide_sweep(&self, context: SweepContext) -> Result<SweepReport> {
        let permit = SweepPermit {
            _guard: Arc::clone(&self.sweep_lock).lock_owned().await,
        };
        self.run_guide_sweep_with(context, permit).await
    }

    /// 取得済みの排他権のもとでスイープを実行する。
    ///
    /// 1件の失敗は記録して次の投票へ進む。
    ///
    /// # Errors
    /// 対象投票の一覧取得に失敗した場合のみエラーを返す。
    pub async fn run_guide_sweep_with(
        &self,
        context: SweepContext,
        _permit: SweepPermit,
    ) -> Result<SweepReport> {
        self.metrics.sweeps_total.inc();
        let votes = self
            .store
            .pending_votes()
            .await
            .context("failed to list votes pending a guide")?;

        info!(
            sweep_id = %context.sweep_id,
            pending = votes.len(),
            "running guide sweep"
        );

        let mut report = SweepReport {
            sweep_id: context.sweep_id,
            ..SweepReport::default()
        };

        for vote in &votes {
            let outcome = tokio::time::timeout(
                self.item_timeout,
                self.guide_generator.generate_guide(vote),
            )
            .await
            .unwrap_or(Err(GenerationError::Timeout(self.item_timeout)));

            match outcome {
                Ok(_) => report.generated += 1,
                Err(err) => {
                    report.failed += 1;
                    if matches!(err, GenerationError::Timeout(_)) {
                        self.metrics.guides_failed.inc();
                    }
                    warn!(
                        sweep_id = %context.sweep_id,
                        vote_id = vote.vote_id,
                        kind = err.kind(),
                        error = %err,
                        "guide generation failed; continuing with remaining votes"
                    );
                }
            }
        }

        if report.failed > 0 && report.generated == 0 {
            error!(
                sweep_id = %context.sweep_id,
                failed = report.failed,
                "guide sweep produced no guides"
            );
        } else {
            info!(
                sweep_id = %context.sweep_id,
                generated = report.generated,
                failed = report.failed,
                "guide sweep completed"
            );
        }

        Ok(report)
    }
}

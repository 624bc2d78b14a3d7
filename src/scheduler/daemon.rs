use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};
use uuid::Uuid;

use crate::scheduler::{DailyCadence, Scheduler, SweepContext};

/// 毎日 `cadence` の時刻にガイドスイープを実行するデーモンを起動する。
pub fn spawn_daily_guide_daemon(scheduler: Scheduler, cadence: DailyCadence) -> JoinHandle<()> {
    GuideDaemon { scheduler, cadence }.spawn()
}

struct GuideDaemon {
    scheduler: Scheduler,
    cadence: DailyCadence,
}

impl GuideDaemon {
    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        loop {
            let now = Utc::now();
            let Some(next) = self.cadence.next_run_from(now) else {
                error!("could not compute the next guide sweep time; daemon stopped");
                return;
            };
            let wait = duration_until(next, now);
            info!(
                next_run_utc = %next.to_rfc3339(),
                next_run_local = %next.with_timezone(&self.cadence.timezone()).to_rfc3339(),
                wait_seconds = wait.as_secs(),
                "scheduled daily guide sweep"
            );
            sleep(wait).await;

            let sweep_id = Uuid::new_v4();
            match self.scheduler.run_guide_sweep(SweepContext::new(sweep_id)).await {
                Ok(report) => info!(
                    %sweep_id,
                    generated = report.generated,
                    failed = report.failed,
                    "automatic guide sweep completed"
                ),
                Err(err) => error!(%sweep_id, error = ?err, "automatic guide sweep failed"),
            }

            // 処理が1秒未満で終わった場合に同じ発火時刻で再実行しないようにする
            sleep(Duration::from_secs(1)).await;
        }
    }
}

fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

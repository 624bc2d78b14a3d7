pub mod cadence;
pub mod daemon;
pub mod jobs;

pub use cadence::DailyCadence;
pub use daemon::spawn_daily_guide_daemon;
pub use jobs::{Scheduler, SweepContext, SweepPermit, SweepReport};

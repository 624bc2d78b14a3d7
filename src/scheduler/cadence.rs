use anyhow::{Result, anyhow};
use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};

/// 固定オフセットのタイムゾーンで毎日同じ時刻に発火するスケジュール。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCadence {
    tz: FixedOffset,
    target: NaiveTime,
}

impl DailyCadence {
    /// # Errors
    /// オフセットや時刻が範囲外の場合はエラーを返す。
    pub fn new(utc_offset_hours: i32, hour: u32, minute: u32) -> Result<Self> {
        let tz = FixedOffset::east_opt(utc_offset_hours * 3600)
            .ok_or_else(|| anyhow!("invalid UTC offset: {utc_offset_hours} hours"))?;
        let target = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("invalid time: {hour:02}:{minute:02}"))?;
        Ok(Self { tz, target })
    }

    #[must_use]
    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    /// `now` 以降で最初の発火時刻。ちょうど発火時刻なら `now` を返す。
    #[must_use]
    pub fn next_run_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let localized_now = now.with_timezone(&self.tz);
        let mut date = localized_now.date_naive();
        if localized_now.time() > self.target {
            date = date.checked_add_days(Days::new(1))?;
        }

        self.tz
            .from_local_datetime(&date.and_time(self.target))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

//! Calendar boundaries in the game's fixed timezone.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveTime, Offset, Timelike, Utc};

/// Local wall-clock position inside the current hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HourSlot {
    pub day: u32,
    pub month: u32,
    pub hour: u32,
    pub second_of_hour: u32,
}

fn offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
        .unwrap_or_else(|| Utc.fix())
}

fn local(now_ms: u64, utc_offset_minutes: i32) -> DateTime<FixedOffset> {
    DateTime::from_timestamp_millis(now_ms as i64)
        .unwrap_or_default()
        .with_timezone(&offset(utc_offset_minutes))
}

/// Start of the current week (Monday 00:00 local) in ms since the epoch.
pub fn week_start_ms(now_ms: u64, utc_offset_minutes: i32) -> u64 {
    let now = local(now_ms, utc_offset_minutes);
    let back = Days::new(now.weekday().num_days_from_monday() as u64);
    now.date_naive()
        .checked_sub_days(back)
        .map(|monday| monday.and_time(NaiveTime::MIN))
        .and_then(|midnight| midnight.and_local_timezone(offset(utc_offset_minutes)).single())
        .map(|start| start.timestamp_millis().max(0) as u64)
        .unwrap_or(0)
}

/// Calendar day in `YYYY-MM-DD` form.
pub fn day_key(now_ms: u64, utc_offset_minutes: i32) -> String {
    local(now_ms, utc_offset_minutes)
        .format("%Y-%m-%d")
        .to_string()
}

pub fn hour_slot(now_ms: u64, utc_offset_minutes: i32) -> HourSlot {
    let now = local(now_ms, utc_offset_minutes);
    HourSlot {
        day: now.day(),
        month: now.month(),
        hour: now.hour(),
        second_of_hour: now.minute() * 60 + now.second(),
    }
}

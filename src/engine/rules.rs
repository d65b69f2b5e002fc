//! Pure point arithmetic. Nothing in here touches storage or the clock.

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::config::PointTable;
use crate::model::attendance::AttendanceType;
use crate::model::points::{ActivityCode, PointsEvent};

/// One history line an award will write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardLine {
    pub code: ActivityCode,
    pub points: i64,
}

/// `(is_late, late_minutes)` for a check-in observed at `observed`.
pub fn lateness(observed: NaiveTime, max_clock_in: NaiveTime) -> (bool, u32) {
    if observed <= max_clock_in {
        return (false, 0);
    }
    let minutes = (observed - max_clock_in).num_minutes().max(0);
    (true, u32::try_from(minutes).unwrap_or(u32::MAX))
}

pub fn is_too_early_for_checkout(observed: NaiveTime, min_clock_out: NaiveTime) -> bool {
    observed < min_clock_out
}

/// Next record type given the last successful record of the day.
pub fn next_attendance_type(last: Option<AttendanceType>) -> AttendanceType {
    match last {
        Some(AttendanceType::CheckIn) => AttendanceType::CheckOut,
        None | Some(AttendanceType::CheckOut) => AttendanceType::CheckIn,
    }
}

/// Late check-ins lose one point per full ten minutes, but always earn at least one.
pub fn late_penalty(base: i64, late_minutes: u32) -> i64 {
    (base - i64::from(late_minutes / 10)).max(1)
}

/// Base lines for an attendance event. The early-bird bonus is written in
/// addition to the on-time line, never instead of it.
pub fn base_award(
    event: &PointsEvent,
    table: &PointTable,
    early_bird_before: NaiveTime,
) -> Vec<AwardLine> {
    match event.kind {
        AttendanceType::CheckOut => vec![AwardLine {
            code: ActivityCode::CheckOut,
            points: table.amount(ActivityCode::CheckOut),
        }],
        AttendanceType::CheckIn if event.is_late => vec![AwardLine {
            code: ActivityCode::CheckInLate,
            points: late_penalty(table.amount(ActivityCode::CheckInLate), event.late_minutes),
        }],
        AttendanceType::CheckIn => {
            let mut lines = Vec::with_capacity(2);
            if event.occurred_at.time() < early_bird_before {
                lines.push(AwardLine {
                    code: ActivityCode::CheckInEarlyBird,
                    points: table.amount(ActivityCode::CheckInEarlyBird),
                });
            }
            lines.push(AwardLine {
                code: ActivityCode::CheckInOnTime,
                points: table.amount(ActivityCode::CheckInOnTime),
            });
            lines
        }
    }
}

/// Streak after a qualifying check-in on `today`, given the day of the
/// previous qualifying check-in.
pub fn next_streak(current: u32, streak_date: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(previous) = streak_date else {
        return 1;
    };
    match (today - previous).num_days() {
        1 => current.saturating_add(1),
        d if d > 1 => 1,
        // same day, or an out-of-order replay
        _ => current.max(1),
    }
}

/// First day of the streak run that ends on `today`.
pub fn streak_start(today: NaiveDate, streak: u32) -> NaiveDate {
    today - Duration::days(i64::from(streak.saturating_sub(1)))
}

/// First day of a trailing window of `days` days that ends on `today` inclusive.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today - Duration::days(i64::from(days.saturating_sub(1)))
}

pub fn attendance_key(attendance_id: u64, code: ActivityCode) -> String {
    format!("att:{attendance_id}:{code}")
}

pub fn perfect_week_key(user_id: u64, run_start: NaiveDate) -> String {
    format!("{}:{user_id}:{run_start}", ActivityCode::PerfectWeek)
}

pub fn perfect_month_key(user_id: u64, day: NaiveDate) -> String {
    format!("{}:{user_id}:{day}", ActivityCode::PerfectMonth)
}

pub fn redemption_key(redemption_id: u64) -> String {
    format!("redeem:{redemption_id}")
}

pub fn refund_key(redemption_id: u64) -> String {
    format!("refund:{redemption_id}")
}

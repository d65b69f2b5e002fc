use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, instrument, warn};

use crate::engine::error::{EngineResult, RuleViolation};
use crate::engine::rules;
use crate::model::attendance::{AttendanceRecord, AttendanceType, NewAttendance};
use crate::model::points::PointsEvent;
use crate::oracle::TimeSettingsProvider;
use crate::store::{LedgerStore, LedgerTx};

/// Everything the recorder needs to classify one check-in or check-out.
/// Oracle verdicts are resolved by the caller beforehand.
#[derive(Debug, Clone)]
pub struct AttendanceCommand {
    pub user_id: u64,
    pub observed_at: NaiveDateTime,
    pub geo_valid: bool,
    pub face_valid: bool,
    pub excused_today: bool,
}

#[derive(Debug, Clone)]
pub struct AttendanceOutcome {
    pub record: AttendanceRecord,
    /// Present only for a successful record; failed geo or face checks earn nothing.
    pub points_event: Option<PointsEvent>,
}

pub struct AttendanceRecorder<S> {
    store: S,
    times: Arc<dyn TimeSettingsProvider>,
    allow_multiple_sessions: bool,
}

impl<S: LedgerStore> AttendanceRecorder<S> {
    pub fn new(store: S, times: Arc<dyn TimeSettingsProvider>, allow_multiple_sessions: bool) -> Self {
        Self {
            store,
            times,
            allow_multiple_sessions,
        }
    }

    /// Persists the next record of the day for the user. The record type
    /// alternates `CHECK_IN`, `CHECK_OUT` and only successful records count
    /// towards the alternation.
    #[instrument(name = "record_attendance", skip(self, cmd), fields(user_id = cmd.user_id))]
    pub async fn record(&self, cmd: AttendanceCommand) -> EngineResult<AttendanceOutcome> {
        if cmd.excused_today {
            return Err(RuleViolation::AlreadyExcused.into());
        }
        let times = self.times.current().await?;
        let observed = cmd.observed_at.time();

        let mut tx = self.store.begin().await?;
        tx.lock_user(cmd.user_id).await?;
        let last = tx
            .last_successful_attendance(cmd.user_id, cmd.observed_at.date())
            .await?
            .map(|r| r.kind);

        if last == Some(AttendanceType::CheckOut) && !self.allow_multiple_sessions {
            return Err(RuleViolation::AlreadyCheckedOut.into());
        }

        let kind = rules::next_attendance_type(last);
        let (is_late, late_minutes) = match kind {
            AttendanceType::CheckIn => rules::lateness(observed, times.max_clock_in),
            AttendanceType::CheckOut => {
                if rules::is_too_early_for_checkout(observed, times.min_clock_out) {
                    return Err(RuleViolation::TooEarlyForCheckout {
                        min_clock_out: times.min_clock_out,
                        observed,
                    }
                    .into());
                }
                (false, 0)
            }
        };

        let success = cmd.geo_valid && cmd.face_valid;
        let record = tx
            .insert_attendance(NewAttendance {
                user_id: cmd.user_id,
                kind,
                timestamp: cmd.observed_at,
                is_late,
                late_minutes,
                location_valid: cmd.geo_valid,
                face_valid: cmd.face_valid,
                success,
            })
            .await?;
        tx.commit().await?;

        if success {
            info!(attendance_id = record.id, kind = %kind, is_late, late_minutes, "Attendance recorded");
        } else {
            warn!(
                attendance_id = record.id,
                kind = %kind,
                geo_valid = cmd.geo_valid,
                face_valid = cmd.face_valid,
                "Attendance recorded as unsuccessful"
            );
        }

        let points_event = success.then(|| PointsEvent::from(&record));
        Ok(AttendanceOutcome {
            record,
            points_event,
        })
    }

    /// Administrative reset: removes all of the user's records for `day`.
    /// Points already awarded for them stay in the history.
    #[instrument(name = "reset_attendance_day", skip(self))]
    pub async fn reset_day(&self, user_id: u64, day: NaiveDate, actor_id: u64) -> EngineResult<u64> {
        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?;
        let removed = tx.delete_attendance_day(user_id, day).await?;
        tx.commit().await?;
        info!(removed, "Attendance day reset");
        Ok(removed)
    }
}

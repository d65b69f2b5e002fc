use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, AttendanceType};

/// Closed set of reasons a history entry can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityCode {
    CheckInOnTime,
    CheckInEarlyBird,
    CheckInLate,
    CheckOut,
    PerfectWeek,
    PerfectMonth,
    Redemption,
    Refund,
    AdminAdjustment,
}

impl ActivityCode {
    pub fn description(&self) -> &'static str {
        match self {
            ActivityCode::CheckInOnTime => "On-time check-in",
            ActivityCode::CheckInEarlyBird => "Early bird bonus",
            ActivityCode::CheckInLate => "Late check-in",
            ActivityCode::CheckOut => "Check-out",
            ActivityCode::PerfectWeek => "Perfect week bonus",
            ActivityCode::PerfectMonth => "Perfect month bonus",
            ActivityCode::Redemption => "Reward redemption",
            ActivityCode::Refund => "Redemption refund",
            ActivityCode::AdminAdjustment => "Manual adjustment",
        }
    }
}

/// Value handed from the attendance recorder to the ledger. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsEvent {
    pub user_id: u64,
    pub attendance_id: Option<u64>,
    pub kind: AttendanceType,
    pub is_late: bool,
    pub late_minutes: u32,
    pub occurred_at: NaiveDateTime,
}

impl From<&AttendanceRecord> for PointsEvent {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            user_id: record.user_id,
            attendance_id: Some(record.id),
            kind: record.kind,
            is_late: record.is_late,
            late_minutes: record.late_minutes,
            occurred_at: record.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserPointsAccount {
    #[schema(example = 1000)]
    pub user_id: u64,
    /// Spendable balance.
    #[schema(example = 120)]
    pub points: i64,
    #[schema(example = 420)]
    pub total_earned: i64,
    #[schema(example = 3)]
    pub current_streak: u32,
    #[schema(example = 7)]
    pub longest_streak: u32,
    /// Day of the last qualifying check-in; streak continuity is measured from here.
    #[schema(value_type = Option<String>, format = "date")]
    pub streak_date: Option<NaiveDate>,
    #[schema(value_type = String, format = "date-time")]
    pub last_updated: NaiveDateTime,
}

impl UserPointsAccount {
    pub fn empty(user_id: u64, now: NaiveDateTime) -> Self {
        Self {
            user_id,
            points: 0,
            total_earned: 0,
            current_streak: 0,
            longest_streak: 0,
            streak_date: None,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PointHistoryEntry {
    pub id: u64,
    pub user_id: u64,
    /// Signed; spends and negative adjustments are below zero.
    pub points: i64,
    pub reason: String,
    pub activity_code: ActivityCode,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub attendance_id: Option<u64>,
    pub idempotency_key: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub user_id: u64,
    pub points: i64,
    pub reason: String,
    pub activity_code: ActivityCode,
    pub metadata: serde_json::Value,
    pub attendance_id: Option<u64>,
    pub idempotency_key: Option<String>,
    pub date: NaiveDateTime,
}

impl NewHistoryEntry {
    pub fn new(user_id: u64, code: ActivityCode, points: i64, date: NaiveDateTime) -> Self {
        Self {
            user_id,
            points,
            reason: code.description().to_string(),
            activity_code: code,
            metadata: serde_json::Value::Null,
            attendance_id: None,
            idempotency_key: None,
            date,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn attendance(mut self, attendance_id: Option<u64>) -> Self {
        self.attendance_id = attendance_id;
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn into_entry(self, id: u64) -> PointHistoryEntry {
        PointHistoryEntry {
            id,
            user_id: self.user_id,
            points: self.points,
            reason: self.reason,
            activity_code: self.activity_code,
            metadata: self.metadata,
            attendance_id: self.attendance_id,
            idempotency_key: self.idempotency_key,
            date: self.date,
        }
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceType {
    CheckIn,
    CheckOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub user_id: u64,
    pub kind: AttendanceType,
    #[schema(example = "2026-01-05T06:20:00", value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
    pub is_late: bool,
    #[schema(example = 0)]
    pub late_minutes: u32,
    pub location_valid: bool,
    pub face_valid: bool,
    /// False when the geofence or face check failed; such records never earn points.
    pub success: bool,
}

impl AttendanceRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_on_time_check_in(&self) -> bool {
        self.success && self.kind == AttendanceType::CheckIn && !self.is_late
    }
}

/// Row about to be inserted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: u64,
    pub kind: AttendanceType,
    pub timestamp: NaiveDateTime,
    pub is_late: bool,
    pub late_minutes: u32,
    pub location_valid: bool,
    pub face_valid: bool,
    pub success: bool,
}

impl NewAttendance {
    pub fn into_record(self, id: u64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            user_id: self.user_id,
            kind: self.kind,
            timestamp: self.timestamp,
            is_late: self.is_late,
            late_minutes: self.late_minutes,
            location_valid: self.location_valid,
            face_valid: self.face_valid,
            success: self.success,
        }
    }
}

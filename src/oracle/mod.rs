//! Capabilities the engine consumes but does not own: geofencing, face
//! matching, leave status and the configured clock-in/out window.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::engine::error::EngineResult;
use crate::model::leave::LeaveExclusion;

pub mod face;
pub mod geo;
pub mod leave;
pub mod settings;

pub use face::{DescriptorMatcher, MySqlFaceEnrollment};
pub use geo::Geofence;
pub use leave::MySqlLeaveOracle;
pub use settings::{CachedTimeSettings, StaticTimeSettings};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCheck {
    pub valid: bool,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub matched: bool,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSettings {
    /// Check-ins after this are late.
    pub max_clock_in: NaiveTime,
    /// Check-outs before this are refused.
    pub min_clock_out: NaiveTime,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            max_clock_in: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
            min_clock_out: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        }
    }
}

pub trait GeoValidator: Send + Sync {
    fn check(&self, lat: f64, lng: f64) -> GeoCheck;
}

pub trait FaceValidator: Send + Sync {
    fn check(&self, observed: &[f32], enrolled: &[f32]) -> FaceMatch;
}

#[async_trait]
pub trait FaceEnrollment: Send + Sync {
    /// Descriptor captured at enrolment, if the user has one.
    async fn enrolled_descriptor(&self, user_id: u64) -> EngineResult<Option<Vec<f32>>>;
}

#[async_trait]
pub trait LeaveOracle: Send + Sync {
    async fn is_excused(&self, user_id: u64, date: NaiveDate) -> EngineResult<LeaveExclusion>;
}

#[async_trait]
pub trait TimeSettingsProvider: Send + Sync {
    async fn current(&self) -> EngineResult<TimeSettings>;
}

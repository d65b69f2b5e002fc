use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;

use crate::model::points::ActivityCode;
use crate::oracle::TimeSettings;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,
    pub log_level: String,

    // Rate limiting
    pub rate_attendance_per_min: u32,
    pub rate_protected_per_min: u32,

    pub engine: EngineSettings,
    pub dispatch: DispatchSettings,

    /// Fallback when the settings table has no clock-in/out rows.
    pub default_times: TimeSettings,
    pub settings_cache_ttl_secs: u64,

    pub office_lat: f64,
    pub office_lng: f64,
    pub office_radius_meters: f64,
    pub face_match_threshold: f64,
}

/// Points granted per activity, loaded once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointTable {
    pub check_in_on_time: i64,
    pub check_in_early_bird: i64,
    pub check_in_late: i64,
    pub check_out: i64,
    pub perfect_week: i64,
    pub perfect_month: i64,
}

impl Default for PointTable {
    fn default() -> Self {
        Self {
            check_in_on_time: 10,
            check_in_early_bird: 5,
            check_in_late: 5,
            check_out: 5,
            perfect_week: 50,
            perfect_month: 200,
        }
    }
}

impl PointTable {
    /// Base amount for an activity. Spends, refunds and manual adjustments
    /// carry their own amounts and have no table entry.
    pub fn amount(&self, code: ActivityCode) -> i64 {
        match code {
            ActivityCode::CheckInOnTime => self.check_in_on_time,
            ActivityCode::CheckInEarlyBird => self.check_in_early_bird,
            ActivityCode::CheckInLate => self.check_in_late,
            ActivityCode::CheckOut => self.check_out,
            ActivityCode::PerfectWeek => self.perfect_week,
            ActivityCode::PerfectMonth => self.perfect_month,
            ActivityCode::Redemption | ActivityCode::Refund | ActivityCode::AdminAdjustment => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub points: PointTable,
    pub early_bird_before: NaiveTime,
    pub perfect_week_streak: u32,
    pub perfect_month_days: u32,
    pub perfect_month_window_days: u32,
    pub allow_reject_after_approve: bool,
    pub allow_multiple_sessions_per_day: bool,
    pub leaderboard_max_limit: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            points: PointTable::default(),
            early_bird_before: NaiveTime::from_hms_opt(6, 30, 0).unwrap_or_default(),
            perfect_week_streak: 5,
            perfect_month_days: 20,
            perfect_month_window_days: 30,
            allow_reject_after_approve: false,
            allow_multiple_sessions_per_day: false,
            leaderboard_max_limit: 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub backfill_interval_secs: u64,
    pub backfill_lookback_days: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 200,
            backfill_interval_secs: 300,
            backfill_lookback_days: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let engine_defaults = EngineSettings::default();
        let points_defaults = engine_defaults.points.clone();
        let dispatch_defaults = DispatchSettings::default();

        let points = PointTable {
            check_in_on_time: var_or("POINTS_CHECK_IN_ON_TIME", points_defaults.check_in_on_time)?,
            check_in_early_bird: var_or(
                "POINTS_CHECK_IN_EARLY_BIRD",
                points_defaults.check_in_early_bird,
            )?,
            check_in_late: var_or("POINTS_CHECK_IN_LATE", points_defaults.check_in_late)?,
            check_out: var_or("POINTS_CHECK_OUT", points_defaults.check_out)?,
            perfect_week: var_or("POINTS_PERFECT_WEEK", points_defaults.perfect_week)?,
            perfect_month: var_or("POINTS_PERFECT_MONTH", points_defaults.perfect_month)?,
        };

        let engine = EngineSettings {
            points,
            early_bird_before: time_or("EARLY_BIRD_BEFORE", engine_defaults.early_bird_before)?,
            perfect_week_streak: var_or("PERFECT_WEEK_STREAK", engine_defaults.perfect_week_streak)?,
            perfect_month_days: var_or("PERFECT_MONTH_DAYS", engine_defaults.perfect_month_days)?,
            perfect_month_window_days: var_or(
                "PERFECT_MONTH_WINDOW_DAYS",
                engine_defaults.perfect_month_window_days,
            )?,
            allow_reject_after_approve: var_or(
                "ALLOW_REJECT_AFTER_APPROVE",
                engine_defaults.allow_reject_after_approve,
            )?,
            allow_multiple_sessions_per_day: var_or(
                "ALLOW_MULTIPLE_SESSIONS_PER_DAY",
                engine_defaults.allow_multiple_sessions_per_day,
            )?,
            leaderboard_max_limit: var_or(
                "LEADERBOARD_MAX_LIMIT",
                engine_defaults.leaderboard_max_limit,
            )?,
        };

        let dispatch = DispatchSettings {
            max_attempts: var_or("AWARD_MAX_ATTEMPTS", dispatch_defaults.max_attempts)?,
            retry_backoff_ms: var_or("AWARD_RETRY_BACKOFF_MS", dispatch_defaults.retry_backoff_ms)?,
            backfill_interval_secs: var_or(
                "BACKFILL_INTERVAL_SECS",
                dispatch_defaults.backfill_interval_secs,
            )?,
            backfill_lookback_days: var_or(
                "BACKFILL_LOOKBACK_DAYS",
                dispatch_defaults.backfill_lookback_days,
            )?,
        };

        let default_times = TimeSettings::default();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),

            rate_attendance_per_min: var_or("RATE_ATTENDANCE_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            engine,
            dispatch,

            default_times: TimeSettings {
                max_clock_in: time_or("DEFAULT_MAX_CLOCK_IN", default_times.max_clock_in)?,
                min_clock_out: time_or("DEFAULT_MIN_CLOCK_OUT", default_times.min_clock_out)?,
            },
            settings_cache_ttl_secs: var_or("SETTINGS_CACHE_TTL_SECS", 60)?,

            office_lat: var_or("OFFICE_LAT", 0.0)?,
            office_lng: var_or("OFFICE_LNG", 0.0)?,
            office_radius_meters: var_or("OFFICE_RADIUS_METERS", 100.0)?,
            face_match_threshold: var_or("FACE_MATCH_THRESHOLD", 0.6)?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

fn time_or(key: &str, default: NaiveTime) -> Result<NaiveTime> {
    match env::var(key) {
        Ok(raw) => parse_hh_mm(&raw).with_context(|| format!("{key} must be HH:MM, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Parses a 24-hour `HH:MM` wall-clock time.
pub fn parse_hh_mm(raw: &str) -> Result<NaiveTime> {
    Ok(NaiveTime::parse_from_str(raw.trim(), "%H:%M")?)
}

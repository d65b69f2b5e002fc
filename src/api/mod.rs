//! HTTP handlers. Every handler is generic over the ledger store so the
//! same routes run against MySQL in production and memory in tests.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

use crate::config::{DispatchSettings, EngineSettings};
use crate::engine::{AttendanceRecorder, AwardDispatcher, Leaderboard, Ledger, RewardDesk};
use crate::oracle::{FaceEnrollment, FaceValidator, GeoValidator, LeaveOracle, TimeSettingsProvider};
use crate::store::LedgerStore;

pub mod attendance;
pub mod error;
pub mod leaderboard;
pub mod points;
pub mod rewards;

/// External capabilities consulted before an attendance is recorded.
#[derive(Clone)]
pub struct Oracles {
    pub geo: Arc<dyn GeoValidator>,
    pub face: Arc<dyn FaceValidator>,
    pub enrollment: Arc<dyn FaceEnrollment>,
    pub leave: Arc<dyn LeaveOracle>,
    pub times: Arc<dyn TimeSettingsProvider>,
}

pub struct AppState<S> {
    pub recorder: AttendanceRecorder<S>,
    pub ledger: Arc<Ledger<S>>,
    pub dispatcher: AwardDispatcher<S>,
    pub rewards: RewardDesk<S>,
    pub leaderboard: Leaderboard<S>,
    pub oracles: Oracles,
    pub clock: fn() -> NaiveDateTime,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(
        store: S,
        settings: &EngineSettings,
        dispatch: DispatchSettings,
        oracles: Oracles,
    ) -> Self {
        let ledger = Arc::new(Ledger::new(store.clone(), settings.clone()));
        Self {
            recorder: AttendanceRecorder::new(
                store.clone(),
                oracles.times.clone(),
                settings.allow_multiple_sessions_per_day,
            ),
            dispatcher: AwardDispatcher::new(ledger.clone(), dispatch),
            rewards: RewardDesk::new(store.clone(), settings.allow_reject_after_approve),
            leaderboard: Leaderboard::new(store, settings.leaderboard_max_limit),
            ledger,
            oracles,
            clock: local_now,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}

/// Wall-clock time in the server's zone; calendar days roll over at local midnight.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::Config;
    use crate::engine::EngineResult;
    use crate::model::leave::LeaveExclusion;
    use crate::oracle::{DescriptorMatcher, Geofence, StaticTimeSettings, TimeSettings};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    pub const SECRET: &str = "test-secret";

    pub struct Enrolled;

    #[async_trait]
    impl FaceEnrollment for Enrolled {
        async fn enrolled_descriptor(&self, _user_id: u64) -> EngineResult<Option<Vec<f32>>> {
            Ok(Some(vec![0.1, 0.2, 0.3]))
        }
    }

    pub struct OnLeave(pub bool);

    #[async_trait]
    impl LeaveOracle for OnLeave {
        async fn is_excused(&self, user_id: u64, date: NaiveDate) -> EngineResult<LeaveExclusion> {
            Ok(LeaveExclusion {
                excused: self.0,
                leave_type: self.0.then(|| "sick".to_string()),
                ..LeaveExclusion::not_excused(user_id, date)
            })
        }
    }

    pub fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 5)
            .unwrap()
            .and_hms_opt(6, 40, 0)
            .unwrap()
    }

    pub fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: SECRET.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            api_prefix: "/api".to_string(),
            log_level: "debug".to_string(),
            rate_attendance_per_min: 1000,
            rate_protected_per_min: 1000,
            engine: EngineSettings::default(),
            dispatch: DispatchSettings::default(),
            default_times: TimeSettings::default(),
            settings_cache_ttl_secs: 60,
            office_lat: 23.8103,
            office_lng: 90.4125,
            office_radius_meters: 100.0,
            face_match_threshold: 0.6,
        }
    }

    pub fn state(store: &MemoryStore, excused: bool) -> AppState<MemoryStore> {
        let cfg = config();
        let oracles = Oracles {
            geo: Arc::new(Geofence::new(cfg.office_lat, cfg.office_lng, cfg.office_radius_meters)),
            face: Arc::new(DescriptorMatcher::new(cfg.face_match_threshold)),
            enrollment: Arc::new(Enrolled),
            leave: Arc::new(OnLeave(excused)),
            times: Arc::new(StaticTimeSettings(TimeSettings::default())),
        };
        let mut state = AppState::new(store.clone(), &cfg.engine, cfg.dispatch.clone(), oracles);
        state.clock = fixed_clock;
        state
    }
}

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::rules::window_start;
use crate::store::LedgerStore;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Period {
    #[default]
    AllTime,
    Monthly,
    Weekly,
    Daily,
}

impl Period {
    /// Earliest `last_updated` that still counts for the period.
    ///
    /// This filters on last activity, not on points earned inside the
    /// window, so a user who earned a lot early and then went quiet drops
    /// out of the shorter boards entirely.
    pub fn window_start(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let days = match self {
            Period::AllTime => return None,
            Period::Monthly => 30,
            Period::Weekly => 7,
            Period::Daily => 1,
        };
        Some(window_start(now.date(), days).and_time(NaiveTime::default()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// Sequential; equal scores still get distinct ranks.
    #[schema(example = 1)]
    pub rank: u32,
    #[schema(example = 1000)]
    pub user_id: u64,
    #[schema(example = 420)]
    pub points: i64,
    #[schema(example = 900)]
    pub total_earned: i64,
    #[schema(example = 4)]
    pub current_streak: u32,
    #[schema(example = 12)]
    pub longest_streak: u32,
}

pub struct Leaderboard<S> {
    store: S,
    max_limit: u32,
}

impl<S: LedgerStore> Leaderboard<S> {
    pub fn new(store: S, max_limit: u32) -> Self {
        Self { store, max_limit }
    }

    pub async fn rank(
        &self,
        period: Period,
        limit: u32,
        offset: u32,
        now: NaiveDateTime,
    ) -> EngineResult<Vec<LeaderboardEntry>> {
        if limit == 0 || limit > self.max_limit {
            return Err(EngineError::validation(format!(
                "limit must be between 1 and {}",
                self.max_limit
            )));
        }

        let accounts = self
            .store
            .leaderboard(period.window_start(now), limit, offset)
            .await?;

        Ok(accounts
            .into_iter()
            .zip(offset.saturating_add(1)..)
            .map(|(account, rank)| LeaderboardEntry {
                rank,
                user_id: account.user_id,
                points: account.points,
                total_earned: account.total_earned,
                current_streak: account.current_streak,
                longest_streak: account.longest_streak,
            })
            .collect())
    }
}

//! Transactional storage seam for the ledger.
//!
//! Engine operations open one [`LedgerTx`], do all their reads and writes
//! through it and call [`LedgerTx::commit`] once. A transaction dropped
//! without commit is rolled back, so an error returned with `?` anywhere in
//! an operation leaves no partial writes behind.
//!
//! # Implementations
//!
//! - `MySqlStore`: row locks (`SELECT ... FOR UPDATE`) and unique keys in MySQL
//! - `MemoryStore`: in-memory store for tests

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::engine::error::EngineResult;
use crate::model::attendance::{AttendanceRecord, NewAttendance};
use crate::model::badge::{Badge, UserBadge};
use crate::model::points::{ActivityCode, NewHistoryEntry, PointHistoryEntry, UserPointsAccount};
use crate::model::reward::{RedemptionStatus, Reward, RewardRedemption, StockChange};

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[cfg(test)]
pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Redemption row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewRedemption {
    pub user_id: u64,
    pub reward_id: u64,
    pub points_spent: i64,
    pub redeemed_at: NaiveDateTime,
}

#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTx + 'static;

    async fn begin(&self) -> EngineResult<Self::Tx>;

    async fn account(&self, user_id: u64) -> EngineResult<Option<UserPointsAccount>>;

    /// Accounts updated at or after `since` (all accounts when `None`), ordered
    /// by points desc, total earned desc, user id asc.
    async fn leaderboard(
        &self,
        since: Option<NaiveDateTime>,
        limit: u32,
        offset: u32,
    ) -> EngineResult<Vec<UserPointsAccount>>;

    async fn recent_history(&self, user_id: u64, limit: u32)
    -> EngineResult<Vec<PointHistoryEntry>>;

    async fn earned_badges(&self, user_id: u64) -> EngineResult<Vec<Badge>>;

    async fn rewards(&self, active_only: bool) -> EngineResult<Vec<Reward>>;

    async fn redemptions(
        &self,
        user_id: Option<u64>,
        status: Option<RedemptionStatus>,
    ) -> EngineResult<Vec<RewardRedemption>>;

    /// Successful attendance since `since` that has no history entry yet.
    async fn unawarded_attendance(&self, since: NaiveDateTime)
    -> EngineResult<Vec<AttendanceRecord>>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Serialises attendance writes for one user. Fails with `NotFound` for unknown users.
    async fn lock_user(&mut self, user_id: u64) -> EngineResult<()>;

    async fn last_successful_attendance(
        &mut self,
        user_id: u64,
        day: NaiveDate,
    ) -> EngineResult<Option<AttendanceRecord>>;

    async fn insert_attendance(&mut self, record: NewAttendance) -> EngineResult<AttendanceRecord>;

    async fn delete_attendance_day(&mut self, user_id: u64, day: NaiveDate) -> EngineResult<u64>;

    /// Distinct days in `[from, to]` with a successful, non-late check-in.
    async fn on_time_days(&mut self, user_id: u64, from: NaiveDate, to: NaiveDate)
    -> EngineResult<u32>;

    /// Reads and locks the account row until commit.
    async fn lock_account(&mut self, user_id: u64) -> EngineResult<Option<UserPointsAccount>>;

    async fn save_account(&mut self, account: &UserPointsAccount) -> EngineResult<()>;

    /// `None` when an entry with the same idempotency key already exists.
    async fn insert_history(
        &mut self,
        entry: NewHistoryEntry,
    ) -> EngineResult<Option<PointHistoryEntry>>;

    async fn attendance_awarded(&mut self, attendance_id: u64) -> EngineResult<bool>;

    async fn has_history_since(
        &mut self,
        user_id: u64,
        code: ActivityCode,
        since: NaiveDateTime,
    ) -> EngineResult<bool>;

    async fn badge_catalog(&mut self) -> EngineResult<Vec<Badge>>;

    async fn user_badge_ids(&mut self, user_id: u64) -> EngineResult<Vec<u64>>;

    /// `false` when the user already holds the badge.
    async fn insert_user_badge(&mut self, badge: &UserBadge) -> EngineResult<bool>;

    async fn lock_reward(&mut self, reward_id: u64) -> EngineResult<Option<Reward>>;

    /// Takes one unit if any is left; `false` means the stock was already zero.
    async fn take_one(&mut self, reward_id: u64) -> EngineResult<bool>;

    /// Applies `delta` to a finite stock and returns the new quantity.
    async fn add_stock(&mut self, reward_id: u64, delta: i32) -> EngineResult<i32>;

    async fn insert_stock_change(&mut self, change: &StockChange) -> EngineResult<()>;

    /// Redemptions of `reward_id` by `user_id` that were not rejected.
    async fn active_redemptions(&mut self, user_id: u64, reward_id: u64) -> EngineResult<u32>;

    async fn insert_redemption(&mut self, redemption: NewRedemption)
    -> EngineResult<RewardRedemption>;

    async fn lock_redemption(&mut self, redemption_id: u64)
    -> EngineResult<Option<RewardRedemption>>;

    async fn save_redemption(&mut self, redemption: &RewardRedemption) -> EngineResult<()>;

    async fn commit(self) -> EngineResult<()>;
}

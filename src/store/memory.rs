//! In-memory ledger store for tests.
//!
//! One async mutex guards the whole state, so transactions are fully
//! serialised. A transaction works on a copy and only publishes it on commit.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, LedgerTx, NewRedemption};
use crate::engine::error::{EngineError, EngineResult};
use crate::model::attendance::{AttendanceRecord, AttendanceType, NewAttendance};
use crate::model::badge::{Badge, UserBadge};
use crate::model::points::{ActivityCode, NewHistoryEntry, PointHistoryEntry, UserPointsAccount};
use crate::model::reward::{RedemptionStatus, Reward, RewardRedemption, StockChange};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    next_id: u64,
    pub attendance: Vec<AttendanceRecord>,
    pub accounts: BTreeMap<u64, UserPointsAccount>,
    pub history: Vec<PointHistoryEntry>,
    pub badges: Vec<Badge>,
    pub user_badges: Vec<UserBadge>,
    pub rewards: BTreeMap<u64, Reward>,
    pub stock_changes: Vec<StockChange>,
    pub redemptions: BTreeMap<u64, RewardRedemption>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_badge_insert: AtomicBool,
    fail_on_commit: AtomicBool,
    conflict_on_begin: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_badge(&self, badge: Badge) {
        self.state.lock().await.badges.push(badge);
    }

    pub async fn add_reward(&self, reward: Reward) {
        self.state.lock().await.rewards.insert(reward.id, reward);
    }

    pub async fn put_account(&self, account: UserPointsAccount) {
        self.state
            .lock()
            .await
            .accounts
            .insert(account.user_id, account);
    }

    pub async fn put_attendance(&self, record: NewAttendance) -> AttendanceRecord {
        let mut state = self.state.lock().await;
        let record = record.into_record(state.next_id());
        state.attendance.push(record.clone());
        record
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn history_for(&self, user_id: u64) -> Vec<PointHistoryEntry> {
        self.state
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn reward(&self, reward_id: u64) -> Option<Reward> {
        self.state.lock().await.rewards.get(&reward_id).cloned()
    }

    pub fn set_fail_on_badge_insert(&self, fail: bool) {
        self.faults.fail_on_badge_insert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_conflict_on_begin(&self, conflict: bool) {
        self.faults.conflict_on_begin.store(conflict, Ordering::SeqCst);
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
    faults: Arc<Faults>,
}

fn leaderboard_order(a: &UserPointsAccount, b: &UserPointsAccount) -> std::cmp::Ordering {
    b.points
        .cmp(&a.points)
        .then(b.total_earned.cmp(&a.total_earned))
        .then(a.user_id.cmp(&b.user_id))
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> EngineResult<MemoryTx> {
        if self.faults.conflict_on_begin.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Conflict("injected lock timeout".into()));
        }
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx {
            guard,
            work,
            faults: self.faults.clone(),
        })
    }

    async fn account(&self, user_id: u64) -> EngineResult<Option<UserPointsAccount>> {
        Ok(self.state.lock().await.accounts.get(&user_id).cloned())
    }

    async fn leaderboard(
        &self,
        since: Option<NaiveDateTime>,
        limit: u32,
        offset: u32,
    ) -> EngineResult<Vec<UserPointsAccount>> {
        let state = self.state.lock().await;
        let mut accounts: Vec<_> = state
            .accounts
            .values()
            .filter(|a| since.is_none_or(|since| a.last_updated >= since))
            .cloned()
            .collect();
        accounts.sort_by(leaderboard_order);
        Ok(accounts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn recent_history(
        &self,
        user_id: u64,
        limit: u32,
    ) -> EngineResult<Vec<PointHistoryEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn earned_badges(&self, user_id: u64) -> EngineResult<Vec<Badge>> {
        let state = self.state.lock().await;
        Ok(state
            .user_badges
            .iter()
            .filter(|ub| ub.user_id == user_id)
            .filter_map(|ub| state.badges.iter().find(|b| b.id == ub.badge_id).cloned())
            .collect())
    }

    async fn rewards(&self, active_only: bool) -> EngineResult<Vec<Reward>> {
        let state = self.state.lock().await;
        Ok(state
            .rewards
            .values()
            .filter(|r| !active_only || r.is_active)
            .cloned()
            .collect())
    }

    async fn redemptions(
        &self,
        user_id: Option<u64>,
        status: Option<RedemptionStatus>,
    ) -> EngineResult<Vec<RewardRedemption>> {
        let state = self.state.lock().await;
        Ok(state
            .redemptions
            .values()
            .rev()
            .filter(|r| user_id.is_none_or(|u| r.user_id == u))
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn unawarded_attendance(
        &self,
        since: NaiveDateTime,
    ) -> EngineResult<Vec<AttendanceRecord>> {
        let state = self.state.lock().await;
        let awarded: HashSet<u64> = state.history.iter().filter_map(|h| h.attendance_id).collect();
        Ok(state
            .attendance
            .iter()
            .filter(|a| a.success && a.timestamp >= since && !awarded.contains(&a.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_user(&mut self, _user_id: u64) -> EngineResult<()> {
        Ok(())
    }

    async fn last_successful_attendance(
        &mut self,
        user_id: u64,
        day: NaiveDate,
    ) -> EngineResult<Option<AttendanceRecord>> {
        Ok(self
            .work
            .attendance
            .iter()
            .filter(|a| a.user_id == user_id && a.success && a.date() == day)
            .max_by_key(|a| (a.timestamp, a.id))
            .cloned())
    }

    async fn insert_attendance(&mut self, record: NewAttendance) -> EngineResult<AttendanceRecord> {
        let record = record.into_record(self.work.next_id());
        self.work.attendance.push(record.clone());
        Ok(record)
    }

    async fn delete_attendance_day(&mut self, user_id: u64, day: NaiveDate) -> EngineResult<u64> {
        let before = self.work.attendance.len();
        self.work
            .attendance
            .retain(|a| !(a.user_id == user_id && a.date() == day));
        Ok((before - self.work.attendance.len()) as u64)
    }

    async fn on_time_days(
        &mut self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<u32> {
        let days: HashSet<NaiveDate> = self
            .work
            .attendance
            .iter()
            .filter(|a| a.user_id == user_id && a.is_on_time_check_in())
            .map(|a| a.date())
            .filter(|d| *d >= from && *d <= to)
            .collect();
        Ok(days.len() as u32)
    }

    async fn lock_account(&mut self, user_id: u64) -> EngineResult<Option<UserPointsAccount>> {
        Ok(self.work.accounts.get(&user_id).cloned())
    }

    async fn save_account(&mut self, account: &UserPointsAccount) -> EngineResult<()> {
        self.work.accounts.insert(account.user_id, account.clone());
        Ok(())
    }

    async fn insert_history(
        &mut self,
        entry: NewHistoryEntry,
    ) -> EngineResult<Option<PointHistoryEntry>> {
        if let Some(key) = &entry.idempotency_key {
            if self
                .work
                .history
                .iter()
                .any(|h| h.idempotency_key.as_ref() == Some(key))
            {
                return Ok(None);
            }
        }
        let entry = entry.into_entry(self.work.next_id());
        self.work.history.push(entry.clone());
        Ok(Some(entry))
    }

    async fn attendance_awarded(&mut self, attendance_id: u64) -> EngineResult<bool> {
        Ok(self
            .work
            .history
            .iter()
            .any(|h| h.attendance_id == Some(attendance_id)))
    }

    async fn has_history_since(
        &mut self,
        user_id: u64,
        code: ActivityCode,
        since: NaiveDateTime,
    ) -> EngineResult<bool> {
        Ok(self
            .work
            .history
            .iter()
            .any(|h| h.user_id == user_id && h.activity_code == code && h.date >= since))
    }

    async fn badge_catalog(&mut self) -> EngineResult<Vec<Badge>> {
        Ok(self.work.badges.clone())
    }

    async fn user_badge_ids(&mut self, user_id: u64) -> EngineResult<Vec<u64>> {
        Ok(self
            .work
            .user_badges
            .iter()
            .filter(|ub| ub.user_id == user_id)
            .map(|ub| ub.badge_id)
            .collect())
    }

    async fn insert_user_badge(&mut self, badge: &UserBadge) -> EngineResult<bool> {
        if self.faults.fail_on_badge_insert.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence("injected badge insert failure".into()));
        }
        if self
            .work
            .user_badges
            .iter()
            .any(|ub| ub.user_id == badge.user_id && ub.badge_id == badge.badge_id)
        {
            return Ok(false);
        }
        self.work.user_badges.push(badge.clone());
        Ok(true)
    }

    async fn lock_reward(&mut self, reward_id: u64) -> EngineResult<Option<Reward>> {
        Ok(self.work.rewards.get(&reward_id).cloned())
    }

    async fn take_one(&mut self, reward_id: u64) -> EngineResult<bool> {
        match self.work.rewards.get_mut(&reward_id) {
            Some(reward) if reward.quantity > 0 => {
                reward.quantity -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn add_stock(&mut self, reward_id: u64, delta: i32) -> EngineResult<i32> {
        let reward = self
            .work
            .rewards
            .get_mut(&reward_id)
            .ok_or(EngineError::NotFound {
                entity: "reward",
                id: reward_id,
            })?;
        match reward.quantity.checked_add(delta) {
            Some(after) if reward.quantity >= 0 && after >= 0 => {
                reward.quantity = after;
                Ok(after)
            }
            _ => Err(EngineError::validation(format!(
                "stock of reward {reward_id} cannot change by {delta}"
            ))),
        }
    }

    async fn insert_stock_change(&mut self, change: &StockChange) -> EngineResult<()> {
        self.work.stock_changes.push(change.clone());
        Ok(())
    }

    async fn active_redemptions(&mut self, user_id: u64, reward_id: u64) -> EngineResult<u32> {
        Ok(self
            .work
            .redemptions
            .values()
            .filter(|r| {
                r.user_id == user_id
                    && r.reward_id == reward_id
                    && r.status != RedemptionStatus::Rejected
            })
            .count() as u32)
    }

    async fn insert_redemption(
        &mut self,
        redemption: NewRedemption,
    ) -> EngineResult<RewardRedemption> {
        let redemption = RewardRedemption {
            id: self.work.next_id(),
            user_id: redemption.user_id,
            reward_id: redemption.reward_id,
            points_spent: redemption.points_spent,
            status: RedemptionStatus::Pending,
            redeemed_at: redemption.redeemed_at,
            processed_at: None,
            notes: None,
        };
        self.work.redemptions.insert(redemption.id, redemption.clone());
        Ok(redemption)
    }

    async fn lock_redemption(
        &mut self,
        redemption_id: u64,
    ) -> EngineResult<Option<RewardRedemption>> {
        Ok(self.work.redemptions.get(&redemption_id).cloned())
    }

    async fn save_redemption(&mut self, redemption: &RewardRedemption) -> EngineResult<()> {
        self.work
            .redemptions
            .insert(redemption.id, redemption.clone());
        Ok(())
    }

    async fn commit(mut self) -> EngineResult<()> {
        if self.faults.fail_on_commit.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence("injected commit failure".into()));
        }
        *self.guard = std::mem::take(&mut self.work);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(user_id: u64, points: i64, total_earned: i64) -> UserPointsAccount {
        UserPointsAccount {
            points,
            total_earned,
            ..UserPointsAccount::empty(user_id, NaiveDateTime::default())
        }
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.save_account(&account(1, 10, 10)).await.unwrap();
        }
        assert!(store.account(1).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.save_account(&account(1, 10, 10)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.account(1).await.unwrap().unwrap().points, 10);
    }

    #[tokio::test]
    async fn idempotency_keys_are_unique() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let entry = NewHistoryEntry::new(1, ActivityCode::PerfectWeek, 50, NaiveDateTime::default())
            .key("PERFECT_WEEK:1:2026-01-01");
        assert!(tx.insert_history(entry.clone()).await.unwrap().is_some());
        assert!(tx.insert_history(entry).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conditional_decrement_stops_at_zero() {
        let store = MemoryStore::new();
        store
            .add_reward(Reward {
                id: 3,
                name: "Mug".into(),
                points_cost: 10,
                quantity: 1,
                max_per_user: -1,
                is_active: true,
            })
            .await;
        let mut tx = store.begin().await.unwrap();
        assert!(tx.take_one(3).await.unwrap());
        assert!(!tx.take_one(3).await.unwrap());
    }

    #[tokio::test]
    async fn add_stock_rejects_overflow_and_unlimited() {
        let store = MemoryStore::new();
        for (id, quantity) in [(1, 5), (2, -1)] {
            store
                .add_reward(Reward {
                    id,
                    name: "Mug".into(),
                    points_cost: 10,
                    quantity,
                    max_per_user: -1,
                    is_active: true,
                })
                .await;
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.add_stock(1, i32::MAX).await.is_err());
        assert!(tx.add_stock(1, -6).await.is_err());
        assert!(tx.add_stock(2, 1).await.is_err());
        assert_eq!(tx.add_stock(1, 2).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn leaderboard_orders_deterministically() {
        let store = MemoryStore::new();
        store.put_account(account(3, 50, 80)).await;
        store.put_account(account(1, 50, 80)).await;
        store.put_account(account(2, 50, 90)).await;
        store.put_account(account(4, 70, 70)).await;

        let ids: Vec<u64> = store
            .leaderboard(None, 10, 0)
            .await
            .unwrap()
            .iter()
            .map(|a| a.user_id)
            .collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);

        let page: Vec<u64> = store
            .leaderboard(None, 2, 2)
            .await
            .unwrap()
            .iter()
            .map(|a| a.user_id)
            .collect();
        assert_eq!(page, vec![1, 3]);
    }

    #[tokio::test]
    async fn on_time_days_counts_distinct_days() {
        let store = MemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        for (h, late) in [(6, false), (8, false), (9, true)] {
            store
                .put_attendance(NewAttendance {
                    user_id: 1,
                    kind: AttendanceType::CheckIn,
                    timestamp: day.and_hms_opt(h, 0, 0).unwrap(),
                    is_late: late,
                    late_minutes: 0,
                    location_valid: true,
                    face_valid: true,
                    success: true,
                })
                .await;
        }
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.on_time_days(1, day, day).await.unwrap(), 1);
    }
}

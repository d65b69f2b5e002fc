//! Reward catalog and redemption workflow.
//!
//! Row locks are always taken in the order redemption, user, account,
//! reward so that a redeem and a reject running side by side cannot
//! deadlock each other.

use chrono::NaiveDateTime;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::engine::error::{EngineError, EngineResult, RuleViolation};
use crate::engine::rules;
use crate::model::points::{ActivityCode, NewHistoryEntry, UserPointsAccount};
use crate::model::reward::{RedemptionStatus, Reward, RewardRedemption, StockChange, UNLIMITED};
use crate::store::{LedgerStore, LedgerTx, NewRedemption};

pub struct RewardDesk<S> {
    store: S,
    allow_reject_after_approve: bool,
}

impl<S: LedgerStore> RewardDesk<S> {
    pub fn new(store: S, allow_reject_after_approve: bool) -> Self {
        Self {
            store,
            allow_reject_after_approve,
        }
    }

    pub async fn catalog(&self, active_only: bool) -> EngineResult<Vec<Reward>> {
        self.store.rewards(active_only).await
    }

    pub async fn redemptions(
        &self,
        user_id: Option<u64>,
        status: Option<RedemptionStatus>,
    ) -> EngineResult<Vec<RewardRedemption>> {
        self.store.redemptions(user_id, status).await
    }

    /// Spends `points_cost` and reserves one unit of stock in one transaction.
    #[instrument(name = "redeem_reward", skip(self))]
    pub async fn redeem(
        &self,
        user_id: u64,
        reward_id: u64,
        now: NaiveDateTime,
    ) -> EngineResult<RewardRedemption> {
        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?;
        let mut account = tx
            .lock_account(user_id)
            .await?
            .unwrap_or_else(|| UserPointsAccount::empty(user_id, now));
        let reward = tx.lock_reward(reward_id).await?.ok_or(EngineError::NotFound {
            entity: "reward",
            id: reward_id,
        })?;

        if reward.points_cost < 0 {
            return Err(EngineError::validation(format!(
                "reward {reward_id} has a negative cost"
            )));
        }
        if !reward.is_active {
            return Err(RuleViolation::RewardInactive.into());
        }
        if reward.quantity == 0 {
            return Err(RuleViolation::OutOfStock.into());
        }
        if account.points < reward.points_cost {
            return Err(RuleViolation::InsufficientPoints {
                required: reward.points_cost,
                available: account.points,
            }
            .into());
        }
        if reward.max_per_user != UNLIMITED {
            let claimed = tx.active_redemptions(user_id, reward_id).await?;
            if i64::from(claimed) >= i64::from(reward.max_per_user) {
                return Err(RuleViolation::PerUserLimitReached {
                    limit: reward.max_per_user,
                }
                .into());
            }
        }

        // Another redeemer may have taken the last unit since the lock was read.
        if reward.has_finite_stock() && !tx.take_one(reward_id).await? {
            return Err(RuleViolation::OutOfStock.into());
        }

        let redemption = tx
            .insert_redemption(NewRedemption {
                user_id,
                reward_id,
                points_spent: reward.points_cost,
                redeemed_at: now,
            })
            .await?;

        if reward.has_finite_stock() {
            tx.insert_stock_change(&StockChange {
                reward_id,
                delta: -1,
                quantity_after: reward.quantity - 1,
                reason: "redemption".to_string(),
                redemption_id: Some(redemption.id),
                actor_id: Some(user_id),
                changed_at: now,
            })
            .await?;
        }

        let spend = NewHistoryEntry::new(user_id, ActivityCode::Redemption, -reward.points_cost, now)
            .reason(format!("Redeemed {}", reward.name))
            .metadata(json!({ "reward_id": reward_id, "redemption_id": redemption.id }))
            .key(rules::redemption_key(redemption.id));
        tx.insert_history(spend)
            .await?
            .ok_or_else(|| EngineError::Conflict(format!("redemption {} spent twice", redemption.id)))?;

        account.points -= reward.points_cost;
        account.last_updated = account.last_updated.max(now);
        tx.save_account(&account).await?;

        tx.commit().await?;

        info!(
            redemption_id = redemption.id,
            points_spent = reward.points_cost,
            balance = account.points,
            "Reward redeemed"
        );
        Ok(redemption)
    }

    /// Moves a redemption through its lifecycle. Rejection refunds the spent
    /// points and returns the unit to finite stock.
    #[instrument(name = "process_redemption", skip(self, notes))]
    pub async fn process(
        &self,
        redemption_id: u64,
        to: RedemptionStatus,
        notes: Option<String>,
        actor_id: u64,
        now: NaiveDateTime,
    ) -> EngineResult<RewardRedemption> {
        let mut tx = self.store.begin().await?;
        let mut redemption = tx
            .lock_redemption(redemption_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "redemption",
                id: redemption_id,
            })?;

        if !redemption
            .status
            .can_transition(to, self.allow_reject_after_approve)
        {
            return Err(RuleViolation::InvalidTransition {
                from: redemption.status,
                to,
            }
            .into());
        }

        if to == RedemptionStatus::Rejected {
            self.refund(&mut tx, &redemption, actor_id, now).await?;
        }

        let from = redemption.status;
        redemption.status = to;
        redemption.processed_at = Some(now);
        if notes.is_some() {
            redemption.notes = notes;
        }
        tx.save_redemption(&redemption).await?;
        tx.commit().await?;

        info!(from = %from, to = %to, "Redemption processed");
        Ok(redemption)
    }

    async fn refund(
        &self,
        tx: &mut S::Tx,
        redemption: &RewardRedemption,
        actor_id: u64,
        now: NaiveDateTime,
    ) -> EngineResult<()> {
        let user_id = redemption.user_id;
        tx.lock_user(user_id).await?;
        let mut account = tx
            .lock_account(user_id)
            .await?
            .unwrap_or_else(|| UserPointsAccount::empty(user_id, now));

        let entry = NewHistoryEntry::new(user_id, ActivityCode::Refund, redemption.points_spent, now)
            .metadata(json!({
                "reward_id": redemption.reward_id,
                "redemption_id": redemption.id,
                "actor_id": actor_id,
            }))
            .key(rules::refund_key(redemption.id));
        tx.insert_history(entry).await?.ok_or_else(|| {
            EngineError::Conflict(format!("redemption {} already refunded", redemption.id))
        })?;

        // total_earned stays as is
        account.points += redemption.points_spent;
        account.last_updated = account.last_updated.max(now);
        tx.save_account(&account).await?;

        match tx.lock_reward(redemption.reward_id).await? {
            Some(reward) if reward.has_finite_stock() => {
                let quantity_after = tx.add_stock(reward.id, 1).await?;
                tx.insert_stock_change(&StockChange {
                    reward_id: reward.id,
                    delta: 1,
                    quantity_after,
                    reason: "redemption rejected".to_string(),
                    redemption_id: Some(redemption.id),
                    actor_id: Some(actor_id),
                    changed_at: now,
                })
                .await?;
            }
            Some(_) => {}
            None => warn!(
                reward_id = redemption.reward_id,
                "Reward no longer exists, stock not restored"
            ),
        }
        Ok(())
    }

    /// Manual restock or write-off for a finite-stock reward.
    #[instrument(name = "adjust_stock", skip(self, reason))]
    pub async fn adjust_stock(
        &self,
        reward_id: u64,
        delta: i32,
        reason: &str,
        actor_id: u64,
        now: NaiveDateTime,
    ) -> EngineResult<Reward> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("a stock adjustment needs a reason"));
        }
        if delta == 0 {
            return Err(EngineError::validation("stock delta must not be zero"));
        }

        let mut tx = self.store.begin().await?;
        let mut reward = tx.lock_reward(reward_id).await?.ok_or(EngineError::NotFound {
            entity: "reward",
            id: reward_id,
        })?;
        if !reward.has_finite_stock() {
            return Err(EngineError::validation(format!(
                "reward {reward_id} has unlimited stock"
            )));
        }
        match reward.quantity.checked_add(delta) {
            None => {
                return Err(EngineError::validation(format!(
                    "stock change of {delta} is out of range"
                )));
            }
            Some(after) if after < 0 => {
                return Err(EngineError::validation(format!(
                    "stock of reward {reward_id} is {}, cannot remove {}",
                    reward.quantity,
                    delta.unsigned_abs()
                )));
            }
            Some(_) => {}
        }

        reward.quantity = tx.add_stock(reward_id, delta).await?;
        tx.insert_stock_change(&StockChange {
            reward_id,
            delta,
            quantity_after: reward.quantity,
            reason: reason.to_string(),
            redemption_id: None,
            actor_id: Some(actor_id),
            changed_at: now,
        })
        .await?;
        tx.commit().await?;

        info!(quantity = reward.quantity, reason, "Reward stock adjusted");
        Ok(reward)
    }
}

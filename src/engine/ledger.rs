//! Points ledger and streak engine.
//!
//! `award` turns one [`PointsEvent`] into balance, streak, history and badge
//! changes inside a single transaction. The user row is locked first, so
//! awards for the same user are serialised while different users proceed in
//! parallel.

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::config::EngineSettings;
use crate::engine::badges::BadgeEvaluator;
use crate::engine::error::{EngineError, EngineResult, RuleViolation};
use crate::engine::rules::{self, AwardLine};
use crate::model::attendance::AttendanceType;
use crate::model::badge::Badge;
use crate::model::points::{
    ActivityCode, NewHistoryEntry, PointHistoryEntry, PointsEvent, UserPointsAccount,
};
use crate::store::{LedgerStore, LedgerTx};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AwardResult {
    pub points_granted: i64,
    pub new_streak: u32,
    pub history_entry_ids: Vec<u64>,
    pub badges: Vec<Badge>,
    /// True when the attendance had already been paid and nothing changed.
    pub already_applied: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountSummary {
    pub account: Option<UserPointsAccount>,
    pub recent_history: Vec<PointHistoryEntry>,
    pub badges: Vec<Badge>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Adjustment {
    pub account: UserPointsAccount,
    pub entry: PointHistoryEntry,
    pub badges: Vec<Badge>,
}

pub struct Ledger<S> {
    store: S,
    settings: EngineSettings,
    badges: BadgeEvaluator,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S, settings: EngineSettings) -> Self {
        let badges = BadgeEvaluator::new(&settings);
        Self {
            store,
            settings,
            badges,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(
        name = "ledger_award",
        skip(self, event),
        fields(user_id = event.user_id, attendance_id = ?event.attendance_id, kind = %event.kind)
    )]
    pub async fn award(&self, event: &PointsEvent) -> EngineResult<AwardResult> {
        let now = event.occurred_at;
        let today = now.date();
        let lines = rules::base_award(
            event,
            &self.settings.points,
            self.settings.early_bird_before,
        );

        let mut tx = self.store.begin().await?;
        tx.lock_user(event.user_id).await?;
        let mut account = tx
            .lock_account(event.user_id)
            .await?
            .unwrap_or_else(|| UserPointsAccount::empty(event.user_id, now));

        if let Some(attendance_id) = event.attendance_id {
            if tx.attendance_awarded(attendance_id).await? {
                info!("Attendance already awarded, skipping");
                return Ok(AwardResult {
                    points_granted: 0,
                    new_streak: account.current_streak,
                    history_entry_ids: Vec::new(),
                    badges: Vec::new(),
                    already_applied: true,
                });
            }
        }

        let qualifying = event.kind == AttendanceType::CheckIn && !event.is_late;
        if qualifying {
            account.current_streak =
                rules::next_streak(account.current_streak, account.streak_date, today);
            if account.streak_date.is_none_or(|d| d < today) {
                account.streak_date = Some(today);
            }
            account.longest_streak = account.longest_streak.max(account.current_streak);
        }

        let mut granted = 0;
        let mut entry_ids = Vec::with_capacity(lines.len() + 2);
        for line in &lines {
            let mut entry = self.line_entry(event, line);
            if let Some(attendance_id) = event.attendance_id {
                entry = entry.key(rules::attendance_key(attendance_id, line.code));
            }
            let written = tx.insert_history(entry).await?.ok_or_else(|| {
                EngineError::Conflict(format!(
                    "{} for attendance {:?} was recorded concurrently",
                    line.code, event.attendance_id
                ))
            })?;
            granted += line.points;
            entry_ids.push(written.id);
        }

        if qualifying {
            for (code, points, id) in self.milestones(&mut tx, &account, now).await? {
                info!(code = %code, points, "Milestone bonus granted");
                granted += points;
                entry_ids.push(id);
            }
        }

        account.points += granted;
        account.total_earned += granted;
        account.last_updated = account.last_updated.max(now);
        tx.save_account(&account).await?;

        let badges = self.badges.evaluate(&mut tx, &account, today, now).await?;

        tx.commit().await?;

        info!(
            points_granted = granted,
            balance = account.points,
            streak = account.current_streak,
            "Points awarded"
        );

        Ok(AwardResult {
            points_granted: granted,
            new_streak: account.current_streak,
            history_entry_ids: entry_ids,
            badges,
            already_applied: false,
        })
    }

    fn line_entry(&self, event: &PointsEvent, line: &AwardLine) -> NewHistoryEntry {
        NewHistoryEntry::new(event.user_id, line.code, line.points, event.occurred_at)
            .attendance(event.attendance_id)
            .metadata(json!({
                "kind": event.kind,
                "is_late": event.is_late,
                "late_minutes": event.late_minutes,
            }))
    }

    /// Streak and rolling-window bonuses. Each is keyed so that the storage
    /// layer refuses a second payment for the same streak run or day.
    async fn milestones(
        &self,
        tx: &mut S::Tx,
        account: &UserPointsAccount,
        now: NaiveDateTime,
    ) -> EngineResult<Vec<(ActivityCode, i64, u64)>> {
        let today = now.date();
        let user_id = account.user_id;
        let mut paid = Vec::new();

        if account.current_streak == self.settings.perfect_week_streak {
            let run_start = rules::streak_start(today, account.current_streak);
            let points = self.settings.points.amount(ActivityCode::PerfectWeek);
            let entry = NewHistoryEntry::new(user_id, ActivityCode::PerfectWeek, points, now)
                .key(rules::perfect_week_key(user_id, run_start))
                .metadata(json!({ "streak": account.current_streak, "run_start": run_start }));
            if let Some(written) = tx.insert_history(entry).await? {
                paid.push((ActivityCode::PerfectWeek, points, written.id));
            }
        }

        let from = rules::window_start(today, self.settings.perfect_month_window_days);
        let days = tx.on_time_days(user_id, from, today).await?;
        if days >= self.settings.perfect_month_days {
            let since = from.and_time(NaiveTime::default());
            if !tx
                .has_history_since(user_id, ActivityCode::PerfectMonth, since)
                .await?
            {
                let points = self.settings.points.amount(ActivityCode::PerfectMonth);
                let entry = NewHistoryEntry::new(user_id, ActivityCode::PerfectMonth, points, now)
                    .key(rules::perfect_month_key(user_id, today))
                    .metadata(json!({ "on_time_days": days, "window_start": from }));
                if let Some(written) = tx.insert_history(entry).await? {
                    paid.push((ActivityCode::PerfectMonth, points, written.id));
                }
            }
        }

        Ok(paid)
    }

    /// Manual balance correction with a mandatory reason. Positive amounts
    /// count as earned; negative amounts never reduce `total_earned`.
    #[instrument(name = "ledger_adjust", skip(self, reason))]
    pub async fn adjust_points(
        &self,
        user_id: u64,
        delta: i64,
        reason: &str,
        actor_id: u64,
        now: NaiveDateTime,
    ) -> EngineResult<Adjustment> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("an adjustment needs a reason"));
        }
        if delta == 0 {
            return Err(EngineError::validation("adjustment amount must not be zero"));
        }

        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?;
        let mut account = tx
            .lock_account(user_id)
            .await?
            .unwrap_or_else(|| UserPointsAccount::empty(user_id, now));

        let overflow =
            || EngineError::validation(format!("adjustment of {delta} is out of range"));
        let points = account.points.checked_add(delta).ok_or_else(overflow)?;
        if points < 0 {
            return Err(RuleViolation::InsufficientPoints {
                required: delta.saturating_neg(),
                available: account.points,
            }
            .into());
        }
        if delta > 0 {
            account.total_earned = account.total_earned.checked_add(delta).ok_or_else(overflow)?;
        }
        account.points = points;
        account.last_updated = account.last_updated.max(now);

        let entry = NewHistoryEntry::new(user_id, ActivityCode::AdminAdjustment, delta, now)
            .reason(reason)
            .metadata(json!({ "actor_id": actor_id }));
        let entry = tx
            .insert_history(entry)
            .await?
            .ok_or_else(|| EngineError::Conflict("adjustment was recorded twice".into()))?;
        tx.save_account(&account).await?;

        let badges = if delta > 0 {
            self.badges
                .evaluate(&mut tx, &account, now.date(), now)
                .await?
        } else {
            Vec::new()
        };

        tx.commit().await?;

        info!(user_id, delta, actor_id, reason, "Points adjusted");
        Ok(Adjustment {
            account,
            entry,
            badges,
        })
    }

    pub async fn summary(&self, user_id: u64, history_limit: u32) -> EngineResult<AccountSummary> {
        Ok(AccountSummary {
            account: self.store.account(user_id).await?,
            recent_history: self.store.recent_history(user_id, history_limit).await?,
            badges: self.store.earned_badges(user_id).await?,
        })
    }
}

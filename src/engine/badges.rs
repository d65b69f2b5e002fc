use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::config::EngineSettings;
use crate::engine::error::EngineResult;
use crate::engine::rules::window_start;
use crate::model::badge::{Badge, BadgeCriterion, UserBadge};
use crate::model::points::UserPointsAccount;
use crate::store::LedgerTx;

/// Grants catalog badges an account has become eligible for. Runs inside the
/// caller's transaction so a rolled-back award also rolls back its badges.
#[derive(Debug, Clone)]
pub struct BadgeEvaluator {
    perfect_week_streak: u32,
    perfect_month_days: u32,
    perfect_month_window_days: u32,
}

impl BadgeEvaluator {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            perfect_week_streak: settings.perfect_week_streak,
            perfect_month_days: settings.perfect_month_days,
            perfect_month_window_days: settings.perfect_month_window_days,
        }
    }

    /// Returns only the badges newly earned by this call.
    pub async fn evaluate<T: LedgerTx>(
        &self,
        tx: &mut T,
        account: &UserPointsAccount,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> EngineResult<Vec<Badge>> {
        let held = tx.user_badge_ids(account.user_id).await?;
        let candidates: Vec<(Badge, BadgeCriterion)> = tx
            .badge_catalog()
            .await?
            .into_iter()
            .filter(|badge| !held.contains(&badge.id))
            .filter_map(|badge| {
                let criterion = badge.criterion(self.perfect_week_streak)?;
                Some((badge, criterion))
            })
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Only pay for the window count when a month badge is still open.
        let on_time_days = if candidates
            .iter()
            .any(|(_, c)| *c == BadgeCriterion::PerfectMonth)
        {
            let from = window_start(today, self.perfect_month_window_days);
            tx.on_time_days(account.user_id, from, today).await?
        } else {
            0
        };

        let mut earned = Vec::new();
        for (badge, criterion) in candidates {
            if !self.qualifies(criterion, account, on_time_days) {
                continue;
            }
            let row = UserBadge {
                user_id: account.user_id,
                badge_id: badge.id,
                earned_at: now,
            };
            // A concurrent evaluation may have inserted it first; that is fine.
            if tx.insert_user_badge(&row).await? {
                info!(user_id = account.user_id, badge = %badge.name, "Badge earned");
                earned.push(badge);
            }
        }
        Ok(earned)
    }

    fn qualifies(
        &self,
        criterion: BadgeCriterion,
        account: &UserPointsAccount,
        on_time_days: u32,
    ) -> bool {
        match criterion {
            BadgeCriterion::TotalEarned(required) => account.total_earned >= required,
            BadgeCriterion::Streak(required) => account.current_streak >= required,
            BadgeCriterion::StreakAndTotal {
                streak,
                total_earned,
            } => account.current_streak >= streak && account.total_earned >= total_earned,
            BadgeCriterion::PerfectMonth => on_time_days >= self.perfect_month_days,
        }
    }
}

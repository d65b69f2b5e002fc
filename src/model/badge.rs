use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PERFECT_WEEK_BADGE: &str = "Perfect Week";
pub const PERFECT_MONTH_BADGE: &str = "Perfect Month";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Badge {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Rising Star")]
    pub name: String,
    #[schema(example = "bronze")]
    pub level: String,
    #[schema(example = 100)]
    pub points_required: Option<i64>,
    #[schema(example = 5)]
    pub streak_required: Option<u32>,
}

/// What a catalog badge asks of an account before it is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCriterion {
    TotalEarned(i64),
    Streak(u32),
    /// Both a streak and a lifetime total.
    StreakAndTotal { streak: u32, total_earned: i64 },
    PerfectMonth,
}

impl Badge {
    /// Named streak badges ignore any points threshold, so a "Perfect Week"
    /// badge that also lists points still behaves as a pure streak badge.
    /// Any other badge with both thresholds needs both.
    pub fn criterion(&self, perfect_week_streak: u32) -> Option<BadgeCriterion> {
        if self.name.eq_ignore_ascii_case(PERFECT_MONTH_BADGE) {
            return Some(BadgeCriterion::PerfectMonth);
        }
        if self.name.eq_ignore_ascii_case(PERFECT_WEEK_BADGE) {
            return Some(BadgeCriterion::Streak(
                self.streak_required.unwrap_or(perfect_week_streak),
            ));
        }
        match (self.streak_required, self.points_required) {
            (Some(streak), Some(total_earned)) => Some(BadgeCriterion::StreakAndTotal {
                streak,
                total_earned,
            }),
            (Some(streak), None) => Some(BadgeCriterion::Streak(streak)),
            (None, Some(total_earned)) => Some(BadgeCriterion::TotalEarned(total_earned)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserBadge {
    pub user_id: u64,
    pub badge_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub earned_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge(name: &str, points: Option<i64>, streak: Option<u32>) -> Badge {
        Badge {
            id: 1,
            name: name.to_string(),
            level: "bronze".to_string(),
            points_required: points,
            streak_required: streak,
        }
    }

    #[test]
    fn named_badges_are_streak_based() {
        assert_eq!(
            badge("Perfect Week", Some(10), None).criterion(5),
            Some(BadgeCriterion::Streak(5))
        );
        assert_eq!(
            badge("perfect month", None, None).criterion(5),
            Some(BadgeCriterion::PerfectMonth)
        );
    }

    #[test]
    fn threshold_and_plain_badges() {
        assert_eq!(
            badge("Centurion", Some(100), None).criterion(5),
            Some(BadgeCriterion::TotalEarned(100))
        );
        assert_eq!(
            badge("Marathon", None, Some(30)).criterion(5),
            Some(BadgeCriterion::Streak(30))
        );
        assert_eq!(
            badge("Veteran", Some(500), Some(10)).criterion(5),
            Some(BadgeCriterion::StreakAndTotal {
                streak: 10,
                total_earned: 500
            })
        );
        assert_eq!(badge("Decorative", None, None).criterion(5), None);
    }
}

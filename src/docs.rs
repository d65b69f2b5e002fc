use crate::api::attendance::{AttendanceRequest, AttendanceResponse};
use crate::api::leaderboard::LeaderboardResponse;
use crate::api::points::AdjustPoints;
use crate::api::rewards::{ProcessRedemption, StockAdjustment};
use crate::engine::{AccountSummary, Adjustment, LeaderboardEntry, Period};
use crate::model::attendance::{AttendanceRecord, AttendanceType};
use crate::model::badge::Badge;
use crate::model::points::{ActivityCode, PointHistoryEntry, UserPointsAccount};
use crate::model::reward::{RedemptionStatus, Reward, RewardRedemption};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Points API",
        version = "1.0.0",
        description = r#"
## Attendance-to-Points Ledger

Employees check in and out with face verification and geofencing, earn points for
punctual attendance, redeem points for rewards and compete on leaderboards.

### Points
- On-time check-in, early-bird bonus, late check-in (reduced), check-out
- Perfect week (5 consecutive on-time days) and perfect month (20 on-time days in 30) bonuses, each paid once per qualifying period
- Badges unlocked by total earned points and streaks

### Rewards
- Redemptions reserve stock and spend points atomically
- `PENDING -> APPROVED -> DELIVERED`, or `PENDING -> REJECTED` with a full refund

### Security
All endpoints require **JWT Bearer authentication**. Balance, stock and redemption
administration is limited to **Admin** and **HR**.

### Errors
Failures return `{"error": CODE, "message": text}`. `CONCURRENCY_CONFLICT` responses are safe to retry.
"#,
    ),
    paths(
        crate::api::attendance::record_attendance,
        crate::api::attendance::reset_day,

        crate::api::points::my_points,
        crate::api::points::adjust_points,

        crate::api::rewards::list_rewards,
        crate::api::rewards::redeem,
        crate::api::rewards::adjust_stock,
        crate::api::rewards::list_redemptions,
        crate::api::rewards::process_redemption,

        crate::api::leaderboard::leaderboard
    ),
    components(
        schemas(
            AttendanceRequest,
            AttendanceResponse,
            AttendanceRecord,
            AttendanceType,
            AdjustPoints,
            AccountSummary,
            Adjustment,
            UserPointsAccount,
            PointHistoryEntry,
            ActivityCode,
            Badge,
            Reward,
            RewardRedemption,
            RedemptionStatus,
            StockAdjustment,
            ProcessRedemption,
            LeaderboardResponse,
            LeaderboardEntry,
            Period
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Check-in/check-out recording"),
        (name = "Points", description = "Balances, history and manual adjustments"),
        (name = "Rewards", description = "Reward catalog and redemption workflow"),
        (name = "Leaderboard", description = "Points ranking"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Sentinel for unlimited stock and unlimited per-user claims.
pub const UNLIMITED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Reward {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Coffee voucher")]
    pub name: String,
    #[schema(example = 300)]
    pub points_cost: i64,
    /// -1 means unlimited.
    #[schema(example = 10)]
    pub quantity: i32,
    /// -1 means unlimited.
    #[schema(example = -1)]
    pub max_per_user: i32,
    pub is_active: bool,
}

impl Reward {
    pub fn has_finite_stock(&self) -> bool {
        self.quantity != UNLIMITED
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Delivered,
    Rejected,
}

impl RedemptionStatus {
    /// `PENDING -> APPROVED -> DELIVERED`, `PENDING -> DELIVERED`,
    /// `PENDING -> REJECTED`, and `APPROVED -> REJECTED` only when enabled.
    pub fn can_transition(&self, to: RedemptionStatus, allow_reject_after_approve: bool) -> bool {
        use RedemptionStatus::*;
        match (self, to) {
            (Pending, Approved) | (Pending, Delivered) | (Approved, Delivered) => true,
            (Pending, Rejected) => true,
            (Approved, Rejected) => allow_reject_after_approve,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RewardRedemption {
    pub id: u64,
    pub user_id: u64,
    pub reward_id: u64,
    pub points_spent: i64,
    pub status: RedemptionStatus,
    #[schema(value_type = String, format = "date-time")]
    pub redeemed_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub processed_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

/// Audit row for every change to a reward's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockChange {
    pub reward_id: u64,
    pub delta: i32,
    pub quantity_after: i32,
    pub reason: String,
    pub redemption_id: Option<u64>,
    pub actor_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub changed_at: NaiveDateTime,
}

//! Error taxonomy for the attendance and points engine.
//!
//! Every mutating operation either commits all of its writes or none of them,
//! so each variant here also means "nothing was changed".

use chrono::NaiveTime;
use thiserror::Error;

use crate::model::reward::RedemptionStatus;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input. The caller has to fix the request.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// A business rule refused the operation.
    #[error(transparent)]
    Rule(#[from] RuleViolation),

    /// Lost a race on a contended row. Retrying the whole operation is safe.
    #[error("Concurrency conflict: {0}")]
    Conflict(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("User is on approved leave today")]
    AlreadyExcused,

    #[error("Check-out is not allowed before {min_clock_out} (observed {observed})")]
    TooEarlyForCheckout {
        min_clock_out: NaiveTime,
        observed: NaiveTime,
    },

    #[error("Attendance for today is already complete")]
    AlreadyCheckedOut,

    #[error("Insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("Reward is out of stock")]
    OutOfStock,

    #[error("Reward is not active")]
    RewardInactive,

    #[error("Per-user limit of {limit} redemptions reached")]
    PerUserLimitReached { limit: i32 },

    #[error("Redemption cannot move from {from} to {to}")]
    InvalidTransition {
        from: RedemptionStatus,
        to: RedemptionStatus,
    },
}

impl RuleViolation {
    pub fn code(&self) -> &'static str {
        match self {
            RuleViolation::AlreadyExcused => "ALREADY_EXCUSED",
            RuleViolation::TooEarlyForCheckout { .. } => "TOO_EARLY_FOR_CHECKOUT",
            RuleViolation::AlreadyCheckedOut => "ALREADY_CHECKED_OUT",
            RuleViolation::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            RuleViolation::OutOfStock => "OUT_OF_STOCK",
            RuleViolation::RewardInactive => "REWARD_INACTIVE",
            RuleViolation::PerUserLimitReached { .. } => "PER_USER_LIMIT_REACHED",
            RuleViolation::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::Rule(rule) => rule.code(),
            EngineError::Conflict(_) => "CONCURRENCY_CONFLICT",
            EngineError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Whether replaying the operation from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict(_) | EngineError::Persistence(_))
    }

    pub fn rule(&self) -> Option<&RuleViolation> {
        match self {
            EngineError::Rule(rule) => Some(rule),
            _ => None,
        }
    }
}

//! Attendance-to-points ledger engine.
//!
//! Attendance recorder -> points ledger -> badge evaluator, with the reward
//! desk and leaderboard working over the same store.

pub mod attendance;
pub mod badges;
pub mod dispatch;
pub mod error;
pub mod leaderboard;
pub mod ledger;
pub mod rewards;
pub mod rules;

pub use attendance::{AttendanceCommand, AttendanceOutcome, AttendanceRecorder};
pub use dispatch::AwardDispatcher;
pub use error::{EngineError, EngineResult, RuleViolation};
pub use leaderboard::{Leaderboard, LeaderboardEntry, Period};
pub use ledger::{AccountSummary, Adjustment, AwardResult, Ledger};
pub use rewards::RewardDesk;

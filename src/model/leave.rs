use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Approved leave covering a user on a given day, as reported by the leave workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveExclusion {
    pub user_id: u64,
    pub date: NaiveDate,
    pub excused: bool,
    pub leave_type: Option<String>,
}

impl LeaveExclusion {
    pub fn not_excused(user_id: u64, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            excused: false,
            leave_type: None,
        }
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;

use super::LeaveOracle;
use crate::engine::error::EngineResult;
use crate::model::leave::LeaveExclusion;
use crate::store::mysql::map_sqlx_error;

/// Answers "is this user on approved leave today" from the leave workflow tables.
#[derive(Clone)]
pub struct MySqlLeaveOracle {
    pool: MySqlPool,
}

impl MySqlLeaveOracle {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaveOracle for MySqlLeaveOracle {
    async fn is_excused(&self, user_id: u64, date: NaiveDate) -> EngineResult<LeaveExclusion> {
        let leave_type = sqlx::query_scalar::<_, String>(
            r#"
            SELECT lr.leave_type
            FROM leave_requests lr
            JOIN users u ON u.employee_id = lr.employee_id
            WHERE u.id = ?
            AND lr.status = 'approved'
            AND ? BETWEEN lr.start_date AND lr.end_date
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(match leave_type {
            Some(leave_type) => LeaveExclusion {
                user_id,
                date,
                excused: true,
                leave_type: Some(leave_type),
            },
            None => LeaveExclusion::not_excused(user_id, date),
        })
    }
}

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySql, MySqlPool, Row, Transaction};

use super::{LedgerStore, LedgerTx, NewRedemption};
use crate::engine::error::{EngineError, EngineResult};
use crate::model::attendance::{AttendanceRecord, AttendanceType, NewAttendance};
use crate::model::badge::{Badge, UserBadge};
use crate::model::points::{ActivityCode, NewHistoryEntry, PointHistoryEntry, UserPointsAccount};
use crate::model::reward::{RedemptionStatus, Reward, RewardRedemption, StockChange};

const DEADLOCK_SQLSTATE: &str = "40001";
const LOCK_WAIT_TIMEOUT: u16 = 1205;
const DUPLICATE_ENTRY: u16 = 1062;

const ATTENDANCE_COLUMNS: &str = "id, user_id, kind, recorded_at, is_late, late_minutes, \
     location_valid, face_valid, success";
const ACCOUNT_COLUMNS: &str =
    "user_id, points, total_earned, current_streak, longest_streak, streak_date, last_updated";
const HISTORY_COLUMNS: &str =
    "id, user_id, points, reason, activity_code, metadata, attendance_id, idempotency_key, created_at";
const REWARD_COLUMNS: &str = "id, name, points_cost, quantity, max_per_user, is_active";
const REDEMPTION_COLUMNS: &str =
    "id, user_id, reward_id, points_spent, status, redeemed_at, processed_at, notes";
const BADGE_COLUMNS: &str = "id, name, level, points_required, streak_required";

/// Maps driver errors onto the engine taxonomy: deadlocks and lock wait
/// timeouts are retryable conflicts, everything else is a persistence failure.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> EngineError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(DEADLOCK_SQLSTATE) {
            return EngineError::Conflict(db_err.message().to_string());
        }
        if let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
            if mysql_err.number() == LOCK_WAIT_TIMEOUT {
                return EngineError::Conflict(mysql_err.message().to_string());
            }
        }
    }
    tracing::error!(error = %e, "Database operation failed");
    EngineError::Persistence(e.to_string())
}

fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|mysql_err| mysql_err.number() == DUPLICATE_ENTRY)
            .unwrap_or_else(|| db_err.code().as_deref() == Some("23000")),
        _ => false,
    }
}

fn decode_err(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value {value:?}").into(),
    }
}

fn attendance_from_row(row: &MySqlRow) -> Result<AttendanceRecord, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: kind
            .parse::<AttendanceType>()
            .map_err(|_| decode_err("kind", &kind))?,
        timestamp: row.try_get("recorded_at")?,
        is_late: row.try_get("is_late")?,
        late_minutes: row.try_get("late_minutes")?,
        location_valid: row.try_get("location_valid")?,
        face_valid: row.try_get("face_valid")?,
        success: row.try_get("success")?,
    })
}

fn account_from_row(row: &MySqlRow) -> Result<UserPointsAccount, sqlx::Error> {
    Ok(UserPointsAccount {
        user_id: row.try_get("user_id")?,
        points: row.try_get("points")?,
        total_earned: row.try_get("total_earned")?,
        current_streak: row.try_get("current_streak")?,
        longest_streak: row.try_get("longest_streak")?,
        streak_date: row.try_get("streak_date")?,
        last_updated: row.try_get("last_updated")?,
    })
}

fn history_from_row(row: &MySqlRow) -> Result<PointHistoryEntry, sqlx::Error> {
    let code: String = row.try_get("activity_code")?;
    let metadata: Option<String> = row.try_get("metadata")?;
    Ok(PointHistoryEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        points: row.try_get("points")?,
        reason: row.try_get("reason")?,
        activity_code: code
            .parse::<ActivityCode>()
            .map_err(|_| decode_err("activity_code", &code))?,
        metadata: metadata
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(serde_json::Value::Null),
        attendance_id: row.try_get("attendance_id")?,
        idempotency_key: row.try_get("idempotency_key")?,
        date: row.try_get("created_at")?,
    })
}

fn reward_from_row(row: &MySqlRow) -> Result<Reward, sqlx::Error> {
    Ok(Reward {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        points_cost: row.try_get("points_cost")?,
        quantity: row.try_get("quantity")?,
        max_per_user: row.try_get("max_per_user")?,
        is_active: row.try_get("is_active")?,
    })
}

fn redemption_from_row(row: &MySqlRow) -> Result<RewardRedemption, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(RewardRedemption {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        reward_id: row.try_get("reward_id")?,
        points_spent: row.try_get("points_spent")?,
        status: status
            .parse::<RedemptionStatus>()
            .map_err(|_| decode_err("status", &status))?,
        redeemed_at: row.try_get("redeemed_at")?,
        processed_at: row.try_get("processed_at")?,
        notes: row.try_get("notes")?,
    })
}

fn badge_from_row(row: &MySqlRow) -> Result<Badge, sqlx::Error> {
    Ok(Badge {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        level: row.try_get("level")?,
        points_required: row.try_get("points_required")?,
        streak_required: row.try_get("streak_required")?,
    })
}

fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::default());
    (start, start + chrono::Duration::days(1))
}

fn collect<T>(
    rows: Vec<MySqlRow>,
    map: fn(&MySqlRow) -> Result<T, sqlx::Error>,
) -> EngineResult<Vec<T>> {
    rows.iter()
        .map(map)
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_sqlx_error)
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl LedgerStore for MySqlStore {
    type Tx = MySqlTx;

    async fn begin(&self) -> EngineResult<MySqlTx> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(MySqlTx { tx })
    }

    async fn account(&self, user_id: u64) -> EngineResult<Option<UserPointsAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM user_points WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(account_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn leaderboard(
        &self,
        since: Option<NaiveDateTime>,
        limit: u32,
        offset: u32,
    ) -> EngineResult<Vec<UserPointsAccount>> {
        let filter = if since.is_some() {
            "WHERE last_updated >= ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM user_points {filter} \
             ORDER BY points DESC, total_earned DESC, user_id ASC LIMIT ? OFFSET ?"
        );

        let mut query = sqlx::query(&sql);
        if let Some(since) = since {
            query = query.bind(since);
        }
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        collect(rows, account_from_row)
    }

    async fn recent_history(
        &self,
        user_id: u64,
        limit: u32,
    ) -> EngineResult<Vec<PointHistoryEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM point_history WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        collect(rows, history_from_row)
    }

    async fn earned_badges(&self, user_id: u64) -> EngineResult<Vec<Badge>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.name, b.level, b.points_required, b.streak_required
            FROM user_badges ub
            JOIN badges b ON b.id = ub.badge_id
            WHERE ub.user_id = ?
            ORDER BY ub.earned_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        collect(rows, badge_from_row)
    }

    async fn rewards(&self, active_only: bool) -> EngineResult<Vec<Reward>> {
        let filter = if active_only { "WHERE is_active = TRUE" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {REWARD_COLUMNS} FROM rewards {filter} ORDER BY points_cost, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        collect(rows, reward_from_row)
    }

    async fn redemptions(
        &self,
        user_id: Option<u64>,
        status: Option<RedemptionStatus>,
    ) -> EngineResult<Vec<RewardRedemption>> {
        let mut conditions = Vec::new();
        if user_id.is_some() {
            conditions.push("user_id = ?");
        }
        if status.is_some() {
            conditions.push("status = ?");
        }
        let filter = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {REDEMPTION_COLUMNS} FROM reward_redemptions {filter} \
             ORDER BY redeemed_at DESC, id DESC"
        );

        let mut query = sqlx::query(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        if let Some(status) = status {
            query = query.bind(status.to_string());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;

        collect(rows, redemption_from_row)
    }

    async fn unawarded_attendance(
        &self,
        since: NaiveDateTime,
    ) -> EngineResult<Vec<AttendanceRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ATTENDANCE_COLUMNS}
            FROM attendance_records a
            WHERE a.success = TRUE
            AND a.recorded_at >= ?
            AND NOT EXISTS (SELECT 1 FROM point_history h WHERE h.attendance_id = a.id)
            ORDER BY a.recorded_at, a.id
            "#
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        collect(rows, attendance_from_row)
    }
}

#[async_trait]
impl LedgerTx for MySqlTx {
    async fn lock_user(&mut self, user_id: u64) -> EngineResult<()> {
        let found = sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE id = ? FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        found.map(|_| ()).ok_or(EngineError::NotFound {
            entity: "user",
            id: user_id,
        })
    }

    async fn last_successful_attendance(
        &mut self,
        user_id: u64,
        day: NaiveDate,
    ) -> EngineResult<Option<AttendanceRecord>> {
        let (start, end) = day_bounds(day);
        let row = sqlx::query(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records \
             WHERE user_id = ? AND success = TRUE AND recorded_at >= ? AND recorded_at < ? \
             ORDER BY recorded_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(attendance_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn insert_attendance(&mut self, record: NewAttendance) -> EngineResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (user_id, kind, recorded_at, is_late, late_minutes, location_valid, face_valid, success)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(record.kind.as_ref())
        .bind(record.timestamp)
        .bind(record.is_late)
        .bind(record.late_minutes)
        .bind(record.location_valid)
        .bind(record.face_valid)
        .bind(record.success)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(record.into_record(result.last_insert_id()))
    }

    async fn delete_attendance_day(&mut self, user_id: u64, day: NaiveDate) -> EngineResult<u64> {
        let (start, end) = day_bounds(day);
        let result = sqlx::query(
            "DELETE FROM attendance_records WHERE user_id = ? AND recorded_at >= ? AND recorded_at < ?",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn on_time_days(
        &mut self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<u32> {
        let (start, _) = day_bounds(from);
        let (_, end) = day_bounds(to);
        let days = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT DATE(recorded_at))
            FROM attendance_records
            WHERE user_id = ?
            AND kind = 'CHECK_IN'
            AND success = TRUE
            AND is_late = FALSE
            AND recorded_at >= ? AND recorded_at < ?
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(u32::try_from(days).unwrap_or(0))
    }

    async fn lock_account(&mut self, user_id: u64) -> EngineResult<Option<UserPointsAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM user_points WHERE user_id = ? FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(account_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn save_account(&mut self, account: &UserPointsAccount) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_points
                (user_id, points, total_earned, current_streak, longest_streak, streak_date, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                points = VALUES(points),
                total_earned = VALUES(total_earned),
                current_streak = VALUES(current_streak),
                longest_streak = VALUES(longest_streak),
                streak_date = VALUES(streak_date),
                last_updated = VALUES(last_updated)
            "#,
        )
        .bind(account.user_id)
        .bind(account.points)
        .bind(account.total_earned)
        .bind(account.current_streak)
        .bind(account.longest_streak)
        .bind(account.streak_date)
        .bind(account.last_updated)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn insert_history(
        &mut self,
        entry: NewHistoryEntry,
    ) -> EngineResult<Option<PointHistoryEntry>> {
        let metadata = if entry.metadata.is_null() {
            None
        } else {
            Some(entry.metadata.to_string())
        };

        let result = sqlx::query(
            r#"
            INSERT INTO point_history
                (user_id, points, reason, activity_code, metadata, attendance_id, idempotency_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.points)
        .bind(&entry.reason)
        .bind(entry.activity_code.as_ref())
        .bind(metadata)
        .bind(entry.attendance_id)
        .bind(entry.idempotency_key.as_deref())
        .bind(entry.date)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(done) => Ok(Some(entry.into_entry(done.last_insert_id()))),
            Err(e) if is_duplicate_key(&e) => {
                tracing::debug!(
                    key = ?entry.idempotency_key,
                    user_id = entry.user_id,
                    "History entry already recorded"
                );
                Ok(None)
            }
            Err(e) => Err(map_sqlx_error(e)),
        }
    }

    async fn attendance_awarded(&mut self, attendance_id: u64) -> EngineResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM point_history WHERE attendance_id = ?",
        )
        .bind(attendance_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count > 0)
    }

    async fn has_history_since(
        &mut self,
        user_id: u64,
        code: ActivityCode,
        since: NaiveDateTime,
    ) -> EngineResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM point_history WHERE user_id = ? AND activity_code = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(code.as_ref())
        .bind(since)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count > 0)
    }

    async fn badge_catalog(&mut self) -> EngineResult<Vec<Badge>> {
        let rows = sqlx::query(&format!("SELECT {BADGE_COLUMNS} FROM badges ORDER BY id"))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        collect(rows, badge_from_row)
    }

    async fn user_badge_ids(&mut self, user_id: u64) -> EngineResult<Vec<u64>> {
        sqlx::query_scalar::<_, u64>("SELECT badge_id FROM user_badges WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_user_badge(&mut self, badge: &UserBadge) -> EngineResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_badges (user_id, badge_id, earned_at) VALUES (?, ?, ?)",
        )
        .bind(badge.user_id)
        .bind(badge.badge_id)
        .bind(badge.earned_at)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(map_sqlx_error(e)),
        }
    }

    async fn lock_reward(&mut self, reward_id: u64) -> EngineResult<Option<Reward>> {
        let row = sqlx::query(&format!(
            "SELECT {REWARD_COLUMNS} FROM rewards WHERE id = ? FOR UPDATE"
        ))
        .bind(reward_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(reward_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn take_one(&mut self, reward_id: u64) -> EngineResult<bool> {
        let result =
            sqlx::query("UPDATE rewards SET quantity = quantity - 1 WHERE id = ? AND quantity > 0")
                .bind(reward_id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn add_stock(&mut self, reward_id: u64, delta: i32) -> EngineResult<i32> {
        let result = sqlx::query(
            "UPDATE rewards SET quantity = quantity + ? WHERE id = ? AND quantity >= 0 AND quantity + ? >= 0",
        )
        .bind(delta)
        .bind(reward_id)
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::validation(format!(
                "stock of reward {reward_id} cannot change by {delta}"
            )));
        }

        sqlx::query_scalar::<_, i32>("SELECT quantity FROM rewards WHERE id = ?")
            .bind(reward_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_stock_change(&mut self, change: &StockChange) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reward_stock_history
                (reward_id, delta, quantity_after, reason, redemption_id, actor_id, changed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(change.reward_id)
        .bind(change.delta)
        .bind(change.quantity_after)
        .bind(&change.reason)
        .bind(change.redemption_id)
        .bind(change.actor_id)
        .bind(change.changed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn active_redemptions(&mut self, user_id: u64, reward_id: u64) -> EngineResult<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reward_redemptions WHERE user_id = ? AND reward_id = ? AND status <> 'REJECTED'",
        )
        .bind(user_id)
        .bind(reward_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_redemption(
        &mut self,
        redemption: NewRedemption,
    ) -> EngineResult<RewardRedemption> {
        let status = RedemptionStatus::Pending;
        let result = sqlx::query(
            r#"
            INSERT INTO reward_redemptions (user_id, reward_id, points_spent, status, redeemed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(redemption.user_id)
        .bind(redemption.reward_id)
        .bind(redemption.points_spent)
        .bind(status.as_ref())
        .bind(redemption.redeemed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(RewardRedemption {
            id: result.last_insert_id(),
            user_id: redemption.user_id,
            reward_id: redemption.reward_id,
            points_spent: redemption.points_spent,
            status,
            redeemed_at: redemption.redeemed_at,
            processed_at: None,
            notes: None,
        })
    }

    async fn lock_redemption(
        &mut self,
        redemption_id: u64,
    ) -> EngineResult<Option<RewardRedemption>> {
        let row = sqlx::query(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM reward_redemptions WHERE id = ? FOR UPDATE"
        ))
        .bind(redemption_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(redemption_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn save_redemption(&mut self, redemption: &RewardRedemption) -> EngineResult<()> {
        sqlx::query(
            "UPDATE reward_redemptions SET status = ?, processed_at = ?, notes = ? WHERE id = ?",
        )
        .bind(redemption.status.as_ref())
        .bind(redemption.processed_at)
        .bind(redemption.notes.as_deref())
        .bind(redemption.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn commit(self) -> EngineResult<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}

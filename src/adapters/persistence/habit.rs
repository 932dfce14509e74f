use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, lock_user},
    app_error::AppResult,
    domain::entities::{
        habit::{HabitLockState, HabitLockUpdate, LockReason, select_habits_to_lock},
        user::UserId,
    },
    use_cases::habit_lock::HabitLockRepo,
};

const SELECT_COLS: &str =
    "id, owner_id, is_active, is_premium_tier, locked_at, locked_reason, created_at";

fn row_to_habit(row: sqlx::postgres::PgRow) -> HabitLockState {
    HabitLockState {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        is_active: row.get("is_active"),
        is_premium_tier: row.get("is_premium_tier"),
        locked_at: row.get("locked_at"),
        locked_reason: row.get("locked_reason"),
        created_at: row.get("created_at"),
    }
}

async fn write_lock_state(
    conn: &mut PgConnection,
    owner_id: UserId,
    habit_ids: &[Uuid],
    update: HabitLockUpdate,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE habits SET locked_at = $3, locked_reason = $4
        WHERE owner_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(owner_id)
    .bind(habit_ids)
    .bind(update.locked_at)
    .bind(update.locked_reason)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl HabitLockRepo for PostgresPersistence {
    async fn lock_over_quota(
        &self,
        user_id: UserId,
        quota: usize,
        reason: LockReason,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;
        if lock_user(&mut tx, user_id).await? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM habits WHERE owner_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        let habits: Vec<HabitLockState> = rows.into_iter().map(row_to_habit).collect();

        let to_lock = select_habits_to_lock(&habits, quota);
        if !to_lock.is_empty() {
            write_lock_state(&mut tx, user_id, &to_lock, HabitLockUpdate::lock(now, reason))
                .await?;
        }
        tx.commit().await?;
        Ok(to_lock)
    }

    async fn unlock_all(&self, user_id: UserId) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        if !lock_user(&mut tx, user_id).await? {
            return Ok(0);
        }

        let locked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM habits WHERE owner_id = $1 AND locked_at IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        let count = if locked.is_empty() {
            0
        } else {
            write_lock_state(&mut tx, user_id, &locked, HabitLockUpdate::unlock()).await?
        };
        tx.commit().await?;
        Ok(count)
    }

    async fn mark_premium_tier_if_over_quota(
        &self,
        user_id: UserId,
        habit_id: Uuid,
        quota: usize,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !lock_user(&mut tx, user_id).await? {
            return Ok(false);
        }

        let active: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM habits WHERE owner_id = $1 AND is_active")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if active <= i64::try_from(quota).unwrap_or(i64::MAX) {
            return Ok(false);
        }

        let result =
            sqlx::query("UPDATE habits SET is_premium_tier = TRUE WHERE id = $1 AND owner_id = $2")
                .bind(habit_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_locked(&self, user_id: UserId) -> AppResult<Vec<HabitLockState>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM habits
            WHERE owner_id = $1 AND locked_at IS NOT NULL
            ORDER BY created_at, id
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_habit).collect())
    }
}

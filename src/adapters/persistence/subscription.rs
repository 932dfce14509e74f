use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, lock_user},
    app_error::AppResult,
    domain::entities::{
        subscription::{Subscription, SubscriptionAction, SubscriptionHistoryEntry},
        user::{EntitlementUpdate, UserEntitlement, UserId},
    },
    use_cases::subscription::{ActivationInput, ExpireOutcome, SubscriptionRepo},
};

const SELECT_COLS: &str = r#"
    id, user_id, plan_type, plan_name, price_units, started_at, expires_at,
    active, trial, payment_reference, cancelled_at, created_at
"#;

fn row_to_subscription(row: sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_type: row.get("plan_type"),
        plan_name: row.get("plan_name"),
        price_units: row.get("price_units"),
        started_at: row.get("started_at"),
        expires_at: row.get("expires_at"),
        active: row.get("active"),
        trial: row.get("trial"),
        payment_reference: row.get("payment_reference"),
        cancelled_at: row.get("cancelled_at"),
        created_at: row.get("created_at"),
    }
}

fn row_to_history(row: sqlx::postgres::PgRow) -> SubscriptionHistoryEntry {
    SubscriptionHistoryEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        subscription_id: row.get("subscription_id"),
        action: row.get("action"),
        plan_type: row.get("plan_type"),
        created_at: row.get("created_at"),
    }
}

pub(crate) async fn write_entitlement(
    conn: &mut PgConnection,
    user_id: UserId,
    update: &EntitlementUpdate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET is_premium = $2, premium_plan_type = $3, premium_expires_at = $4
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(update.is_premium)
    .bind(&update.plan_type)
    .bind(update.expires_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn push_history(
    conn: &mut PgConnection,
    subscription: &Subscription,
    action: SubscriptionAction,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO subscription_history (user_id, subscription_id, action, plan_type, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(subscription.user_id)
    .bind(subscription.id)
    .bind(action)
    .bind(&subscription.plan_type)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Supersedes the active row, inserts the new one, mirrors it onto the user
/// and appends history. The caller owns the transaction and has already
/// locked the user row.
pub(crate) async fn activate_in_tx(
    conn: &mut PgConnection,
    input: &ActivationInput,
) -> Result<Subscription, sqlx::Error> {
    let now = input.started_at;

    let superseded = sqlx::query(&format!(
        r#"
        UPDATE subscriptions SET active = FALSE, cancelled_at = $2
        WHERE user_id = $1 AND active
        RETURNING {SELECT_COLS}
        "#
    ))
    .bind(input.user_id)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    for row in superseded {
        let previous = row_to_subscription(row);
        push_history(&mut *conn, &previous, SubscriptionAction::Superseded, now).await?;
    }

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO subscriptions (
            id, user_id, plan_type, plan_name, price_units, started_at, expires_at,
            active, trial, payment_reference, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9, $6)
        RETURNING {SELECT_COLS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(input.user_id)
    .bind(&input.plan_type)
    .bind(&input.plan_name)
    .bind(input.price_units)
    .bind(now)
    .bind(input.expires_at)
    .bind(input.trial)
    .bind(&input.payment_reference)
    .fetch_one(&mut *conn)
    .await?;
    let subscription = row_to_subscription(row);

    write_entitlement(
        &mut *conn,
        input.user_id,
        &EntitlementUpdate::premium(&input.plan_type, input.expires_at),
    )
    .await?;
    push_history(&mut *conn, &subscription, input.action, now).await?;

    Ok(subscription)
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn activate(&self, input: &ActivationInput) -> AppResult<Subscription> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, input.user_id).await?;
        let subscription = activate_in_tx(&mut tx, input).await?;
        tx.commit().await?;
        Ok(subscription)
    }

    async fn cancel_active(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Subscription>> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET active = FALSE, cancelled_at = $2
            WHERE user_id = $1 AND active
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let cancelled = row_to_subscription(row);

        write_entitlement(&mut tx, user_id, &EntitlementUpdate::revoked()).await?;
        push_history(&mut tx, &cancelled, SubscriptionAction::Cancelled, now).await?;
        tx.commit().await?;
        Ok(Some(cancelled))
    }

    async fn get_active(&self, user_id: UserId) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM subscriptions WHERE user_id = $1 AND active"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_subscription))
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM subscriptions
            WHERE active AND expires_at IS NOT NULL AND expires_at < $1
            ORDER BY expires_at
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_subscription).collect())
    }

    async fn expire(
        &self,
        subscription_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ExpireOutcome>> {
        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT user_id FROM subscriptions WHERE id = $1")
                .bind(subscription_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(user_id) = owner else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM subscriptions WHERE id = $1 FOR UPDATE"
        ))
        .bind(subscription_id)
        .fetch_one(&mut *tx)
        .await?;
        let mut subscription = row_to_subscription(row);

        if !subscription.is_overdue(now) {
            return Ok(Some(ExpireOutcome {
                subscription,
                deactivated: false,
                downgraded: false,
            }));
        }

        sqlx::query("UPDATE subscriptions SET active = FALSE WHERE id = $1")
            .bind(subscription_id)
            .execute(&mut *tx)
            .await?;
        subscription.active = false;

        let still_active: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1 AND active)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        let downgraded = !still_active;
        if downgraded {
            write_entitlement(&mut tx, user_id, &EntitlementUpdate::revoked()).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO subscription_history (user_id, subscription_id, action, plan_type, created_at)
            VALUES ($1, $2, 'expired', $3, $4)
            ON CONFLICT (subscription_id) WHERE action = 'expired' DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(subscription_id)
        .bind(&subscription.plan_type)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ExpireOutcome {
            subscription,
            deactivated: true,
            downgraded,
        }))
    }

    async fn list_history(&self, user_id: UserId) -> AppResult<Vec<SubscriptionHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, subscription_id, action, plan_type, created_at
            FROM subscription_history
            WHERE user_id = $1
            ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_history).collect())
    }

    async fn get_entitlement(&self, user_id: UserId) -> AppResult<Option<UserEntitlement>> {
        let row = sqlx::query(
            "SELECT id, is_premium, premium_plan_type, premium_expires_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| UserEntitlement {
            user_id: row.get("id"),
            is_premium: row.get("is_premium"),
            plan_type: row.get("premium_plan_type"),
            expires_at: row.get("premium_expires_at"),
        }))
    }
}

use async_trait::async_trait;
use chrono::Duration;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{
        PostgresPersistence, ensure_user, lock_user, subscription::activate_in_tx,
        unique_violation,
    },
    app_error::AppResult,
    use_cases::payment::{
        CompletePaymentInput, CompletionOutcome, CreatePaymentInput, PaymentRecord, PaymentRepo,
    },
};

const SELECT_COLS: &str = r#"
    id, user_id, token, gateway_charge_id, provider_charge_id, amount, paid_amount,
    currency, plan_type, promo_code_id, discount_applied, status, created_at, processed_at
"#;

fn row_to_payment(row: sqlx::postgres::PgRow) -> PaymentRecord {
    PaymentRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        gateway_charge_id: row.get("gateway_charge_id"),
        provider_charge_id: row.get("provider_charge_id"),
        amount: row.get("amount"),
        paid_amount: row.get("paid_amount"),
        currency: row.get("currency"),
        plan_type: row.get("plan_type"),
        promo_code_id: row.get("promo_code_id"),
        discount_applied: row.get("discount_applied"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        processed_at: row.get("processed_at"),
    }
}

#[async_trait]
impl PaymentRepo for PostgresPersistence {
    async fn create_pending(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord> {
        let mut conn = self.pool.acquire().await?;
        ensure_user(&mut conn, input.user_id).await?;

        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                id, user_id, token, amount, plan_type, promo_code_id, discount_applied, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            ON CONFLICT (token) DO NOTHING
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(&input.token)
        .bind(input.amount)
        .bind(&input.plan_type)
        .bind(input.promo_code_id)
        .bind(input.discount_applied)
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some(row) => Ok(row_to_payment(row)),
            None => {
                let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM payments WHERE token = $1"))
                    .bind(&input.token)
                    .fetch_one(&mut *conn)
                    .await?;
                Ok(row_to_payment(row))
            }
        }
    }

    async fn get_by_token(&self, token: &str) -> AppResult<Option<PaymentRecord>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM payments WHERE token = $1"))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_payment))
    }

    async fn get_by_charge_id(&self, gateway_charge_id: &str) -> AppResult<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM payments WHERE gateway_charge_id = $1"
        ))
        .bind(gateway_charge_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_payment))
    }

    async fn mark_processing(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord> {
        let mut conn = self.pool.acquire().await?;
        ensure_user(&mut conn, input.user_id).await?;

        // The no-op update makes RETURNING yield the stored row on conflict.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                id, user_id, token, amount, plan_type, promo_code_id, discount_applied, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'processing')
            ON CONFLICT (token) DO UPDATE SET status = CASE
                WHEN payments.status = 'pending' THEN 'processing'::payment_status
                ELSE payments.status
            END
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(&input.token)
        .bind(input.amount)
        .bind(&input.plan_type)
        .bind(input.promo_code_id)
        .bind(input.discount_applied)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row_to_payment(row))
    }

    async fn complete(&self, input: &CompletePaymentInput) -> AppResult<CompletionOutcome> {
        let user_id = input.activation.user_id;
        let now = input.activation.started_at;

        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let charge_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM payments WHERE gateway_charge_id = $1 AND token <> $2)",
        )
        .bind(&input.gateway_charge_id)
        .bind(&input.token)
        .fetch_one(&mut *tx)
        .await?;
        if charge_taken {
            return Ok(CompletionOutcome::Duplicate);
        }

        let completed = sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, token, gateway_charge_id, provider_charge_id, amount, paid_amount,
                currency, plan_type, status, created_at, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, 'completed', $9, $9)
            ON CONFLICT (token) DO UPDATE SET
                status = 'completed',
                gateway_charge_id = EXCLUDED.gateway_charge_id,
                provider_charge_id = EXCLUDED.provider_charge_id,
                paid_amount = EXCLUDED.paid_amount,
                currency = EXCLUDED.currency,
                processed_at = EXCLUDED.processed_at
            WHERE payments.status <> 'completed'
            RETURNING promo_code_id, discount_applied
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.token)
        .bind(&input.gateway_charge_id)
        .bind(&input.provider_charge_id)
        .bind(input.paid_amount)
        .bind(&input.currency)
        .bind(&input.activation.plan_type)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await;

        let row = match completed {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(CompletionOutcome::Duplicate),
            // A concurrent completion committed the same charge id first.
            Err(err) if unique_violation(&err).is_some() => {
                tracing::info!(
                    charge_id = %input.gateway_charge_id,
                    constraint = unique_violation(&err).unwrap_or_default(),
                    "Completion lost race on unique constraint"
                );
                return Ok(CompletionOutcome::Duplicate);
            }
            Err(err) => return Err(err.into()),
        };
        let promo_id: Option<Uuid> = row.get("promo_code_id");
        let discount_applied: i64 = row.get("discount_applied");

        let mut activation = input.activation.clone();
        let mut promo_applied = false;
        if let Some(promo_id) = promo_id {
            let already_used: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM promo_uses WHERE promo_id = $1 AND user_id = $2)",
            )
            .bind(promo_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

            let claimed: Option<Option<i32>> = if already_used {
                None
            } else {
                sqlx::query_scalar(
                    r#"
                    UPDATE promo_codes SET used_count = used_count + 1
                    WHERE id = $1 AND (max_uses IS NULL OR used_count < max_uses)
                    RETURNING bonus_days
                    "#,
                )
                .bind(promo_id)
                .fetch_optional(&mut *tx)
                .await?
            };

            match claimed {
                Some(bonus_days) => {
                    promo_applied = true;
                    if let (Some(days), Some(expires_at)) = (bonus_days, activation.expires_at) {
                        activation.expires_at = Some(expires_at + Duration::days(i64::from(days)));
                    }
                }
                None => {
                    tracing::warn!(
                        promo_id = %promo_id,
                        user_id = %user_id,
                        already_used,
                        "Promo no longer redeemable at completion, applying payment without it"
                    );
                }
            }
        }

        let subscription = activate_in_tx(&mut tx, &activation).await?;

        if promo_applied {
            sqlx::query(
                r#"
                INSERT INTO promo_uses (id, promo_id, user_id, subscription_id, discount_applied, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(promo_id)
            .bind(user_id)
            .bind(subscription.id)
            .bind(discount_applied)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(CompletionOutcome::Completed {
            subscription,
            promo_applied,
        })
    }
}

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, on_unique_violation},
    app_error::AppResult,
    domain::entities::{promo_code::PromoCode, user::UserId},
    use_cases::promo::{CreatePromoInput, PromoCodeRepo},
};

const SELECT_COLS: &str = r#"
    id, code, discount_percent, discount_stars, bonus_days, max_uses, used_count,
    valid_from, valid_until, is_active, applicable_plans, created_at
"#;

fn row_to_promo(row: sqlx::postgres::PgRow) -> PromoCode {
    PromoCode {
        id: row.get("id"),
        code: row.get("code"),
        discount_percent: row.get("discount_percent"),
        discount_stars: row.get("discount_stars"),
        bonus_days: row.get("bonus_days"),
        max_uses: row.get("max_uses"),
        used_count: row.get("used_count"),
        valid_from: row.get("valid_from"),
        valid_until: row.get("valid_until"),
        is_active: row.get("is_active"),
        applicable_plans: row.get("applicable_plans"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl PromoCodeRepo for PostgresPersistence {
    async fn get_by_code(&self, code: &str) -> AppResult<Option<PromoCode>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM promo_codes WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_promo))
    }

    async fn has_use(&self, promo_id: Uuid, user_id: UserId) -> AppResult<bool> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM promo_uses WHERE promo_id = $1 AND user_id = $2)",
        )
        .bind(promo_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, input: &CreatePromoInput) -> AppResult<PromoCode> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO promo_codes (
                id, code, discount_percent, discount_stars, bonus_days, max_uses,
                valid_from, valid_until, applicable_plans
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.code)
        .bind(input.discount_percent)
        .bind(input.discount_stars)
        .bind(input.bonus_days)
        .bind(input.max_uses)
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(&input.applicable_plans)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_unique_violation(e, "A promo code with this value already exists"))?;
        Ok(row_to_promo(row))
    }
}

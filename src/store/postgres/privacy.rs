use async_trait::async_trait;
use sqlx::PgPool;

use super::decode_error;
use crate::error::AppError;
use crate::location::model::PrivacyLevel;
use crate::store::PrivacyStore;

pub struct PgPrivacyStore {
    pool: PgPool,
}

impl PgPrivacyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrivacyStore for PgPrivacyStore {
    async fn privacy_level(&self, user_id: &str) -> Result<PrivacyLevel, AppError> {
        let level: Option<String> =
            sqlx::query_scalar("SELECT privacy_level FROM location_privacy WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        match level {
            Some(s) => PrivacyLevel::parse(&s).ok_or_else(|| decode_error("privacy level", &s)),
            None => Ok(PrivacyLevel::default()),
        }
    }

    async fn set_privacy_level(&self, user_id: &str, level: PrivacyLevel) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO location_privacy (user_id, privacy_level, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET privacy_level = EXCLUDED.privacy_level, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(level.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

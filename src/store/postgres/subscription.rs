use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{decode_error, map_unique_violation};
use crate::error::AppError;
use crate::proximity::model::{AlertStatus, EvaluationUpdate, ProximitySubscription};
use crate::store::SubscriptionStore;

const ALERT_COLUMNS: &str = r#"
    alert_id, group_id, initiator_user_id, target_user_id, distance_threshold_meters,
    status, last_triggered_at, last_distance_meters, created_at, updated_at
"#;

const DUPLICATE_MSG: &str = "该成员在此群组中已有未关闭的接近提醒";

#[derive(Debug, FromRow)]
struct AlertRow {
    alert_id: Uuid,
    group_id: String,
    initiator_user_id: String,
    target_user_id: String,
    distance_threshold_meters: i32,
    status: String,
    last_triggered_at: Option<DateTime<Utc>>,
    last_distance_meters: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for ProximitySubscription {
    type Error = AppError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let status = AlertStatus::parse(&row.status).ok_or_else(|| decode_error("alert status", &row.status))?;
        Ok(Self {
            id: row.alert_id,
            group_id: row.group_id,
            initiator_user_id: row.initiator_user_id,
            target_user_id: row.target_user_id,
            distance_threshold_meters: row.distance_threshold_meters,
            status,
            last_triggered_at: row.last_triggered_at,
            last_distance_meters: row.last_distance_meters,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all(rows: Vec<AlertRow>) -> Result<Vec<ProximitySubscription>, AppError> {
    rows.into_iter().map(ProximitySubscription::try_from).collect()
}

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn create(&self, sub: &ProximitySubscription) -> Result<(), AppError> {
        // 部分唯一索引保证同一组合最多一条未关闭的订阅
        sqlx::query(
            r#"
            INSERT INTO proximity_alerts (
                alert_id, group_id, initiator_user_id, target_user_id, distance_threshold_meters,
                status, last_triggered_at, last_distance_meters, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(sub.id)
        .bind(&sub.group_id)
        .bind(&sub.initiator_user_id)
        .bind(&sub.target_user_id)
        .bind(sub.distance_threshold_meters)
        .bind(sub.status.as_str())
        .bind(sub.last_triggered_at)
        .bind(sub.last_distance_meters)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_MSG))?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ProximitySubscription>, AppError> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM proximity_alerts WHERE alert_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProximitySubscription::try_from).transpose()
    }

    async fn list_for_member(&self, group_id: &str, user_id: &str) -> Result<Vec<ProximitySubscription>, AppError> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM proximity_alerts \
             WHERE group_id = $1 AND (initiator_user_id = $2 OR target_user_id = $2) \
             ORDER BY created_at ASC"
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn list_live_for_user(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<Vec<ProximitySubscription>, AppError> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM proximity_alerts \
             WHERE status <> 'dismissed' \
             AND (initiator_user_id = $1 OR target_user_id = $1) \
             AND group_id = ANY($2)"
        ))
        .bind(user_id)
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn apply_evaluation(
        &self,
        id: Uuid,
        expected: AlertStatus,
        update: EvaluationUpdate,
    ) -> Result<Option<ProximitySubscription>, AppError> {
        // 单行条件更新，状态已被其他请求修改时不生效
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "UPDATE proximity_alerts \
             SET status = $3, last_distance_meters = $4, \
                 last_triggered_at = COALESCE($5, last_triggered_at), updated_at = NOW() \
             WHERE alert_id = $1 AND status = $2 \
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(update.status.as_str())
        .bind(update.last_distance_meters)
        .bind(update.triggered_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProximitySubscription::try_from).transpose()
    }

    async fn update(&self, sub: &ProximitySubscription, expected: AlertStatus) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE proximity_alerts
            SET distance_threshold_meters = $2, status = $3, last_triggered_at = $4, updated_at = $5
            WHERE alert_id = $1 AND status = $6
            "#,
        )
        .bind(sub.id)
        .bind(sub.distance_threshold_meters)
        .bind(sub.status.as_str())
        .bind(sub.last_triggered_at)
        .bind(sub.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_MSG))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM proximity_alerts WHERE alert_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

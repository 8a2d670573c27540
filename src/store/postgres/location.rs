use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::location::model::{ConnectionType, Coordinates, LocationSample};
use crate::store::LocationStore;

const SAMPLE_COLUMNS: &str = r#"
    s.sample_id, s.user_id, s.recorded_at, s.latitude, s.longitude,
    s.altitude, s.accuracy, s.altitude_accuracy, s.heading, s.speed,
    s.device_id, s.battery_level, s.connection_type, s.shared_with_group_ids
"#;

/// location_samples 表中的一行
#[derive(Debug, FromRow)]
struct SampleRow {
    sample_id: Uuid,
    user_id: String,
    recorded_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    accuracy: Option<f64>,
    altitude_accuracy: Option<f64>,
    heading: Option<f64>,
    speed: Option<f64>,
    device_id: Option<String>,
    battery_level: Option<f64>,
    connection_type: String,
    shared_with_group_ids: Vec<String>,
}

impl From<SampleRow> for LocationSample {
    fn from(row: SampleRow) -> Self {
        Self {
            sample_id: row.sample_id,
            user_id: row.user_id,
            timestamp: row.recorded_at,
            coordinates: Coordinates {
                latitude: row.latitude,
                longitude: row.longitude,
                altitude: row.altitude,
                accuracy: row.accuracy,
                altitude_accuracy: row.altitude_accuracy,
                heading: row.heading,
                speed: row.speed,
            },
            device_id: row.device_id,
            battery_level: row.battery_level,
            connection_type: ConnectionType::parse(&row.connection_type).unwrap_or_default(),
            shared_with_group_ids: row.shared_with_group_ids.into_iter().collect(),
        }
    }
}

pub struct PgLocationStore {
    pool: PgPool,
}

impl PgLocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationStore for PgLocationStore {
    async fn insert_sample(&self, sample: &LocationSample) -> Result<(), AppError> {
        let group_ids: Vec<String> = sample.shared_with_group_ids.iter().cloned().collect();
        let coords = &sample.coordinates;

        // 位置和共享范围索引在同一事务中写入
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO location_samples (
                sample_id, user_id, recorded_at, latitude, longitude,
                altitude, accuracy, altitude_accuracy, heading, speed,
                device_id, battery_level, connection_type, shared_with_group_ids
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(sample.sample_id)
        .bind(&sample.user_id)
        .bind(sample.timestamp)
        .bind(coords.latitude)
        .bind(coords.longitude)
        .bind(coords.altitude)
        .bind(coords.accuracy)
        .bind(coords.altitude_accuracy)
        .bind(coords.heading)
        .bind(coords.speed)
        .bind(&sample.device_id)
        .bind(sample.battery_level)
        .bind(sample.connection_type.as_str())
        .bind(&group_ids)
        .execute(&mut *tx)
        .await?;

        for group_id in &group_ids {
            sqlx::query(
                r#"
                INSERT INTO location_sample_groups (sample_id, user_id, group_id, recorded_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(sample.sample_id)
            .bind(&sample.user_id)
            .bind(group_id)
            .bind(sample.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn latest_for_user(&self, user_id: &str) -> Result<Option<LocationSample>, AppError> {
        let row = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM location_samples s \
             WHERE s.user_id = $1 ORDER BY s.recorded_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LocationSample::from))
    }

    async fn latest_in_group(&self, user_id: &str, group_id: &str) -> Result<Option<LocationSample>, AppError> {
        // 走 (user_id, group_id, recorded_at DESC) 索引
        let row = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM location_sample_groups g \
             JOIN location_samples s ON s.sample_id = g.sample_id \
             WHERE g.user_id = $1 AND g.group_id = $2 \
             ORDER BY g.recorded_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LocationSample::from))
    }

    async fn latest_in_any_group(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<Option<LocationSample>, AppError> {
        if group_ids.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM location_sample_groups g \
             JOIN location_samples s ON s.sample_id = g.sample_id \
             WHERE g.user_id = $1 AND g.group_id = ANY($2) \
             ORDER BY g.recorded_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(group_ids)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LocationSample::from))
    }

    async fn history(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        group_ids: Option<&[String]>,
    ) -> Result<Vec<LocationSample>, AppError> {
        let rows = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM location_samples s \
             WHERE s.user_id = $1 AND s.recorded_at BETWEEN $2 AND $3 \
             AND ($4::TEXT[] IS NULL OR s.shared_with_group_ids && $4::TEXT[]) \
             ORDER BY s.recorded_at ASC"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(group_ids.map(|ids| ids.to_vec()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LocationSample::from).collect())
    }
}

//! 提醒通知

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::proximity::model::ProximitySubscription;

pub const PROXIMITY_ALERT_KIND: &str = "proximity_alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub priority: NotificationPriority,
}

impl Notification {
    /// 接近提醒触发时发给双方的两条通知，先发起人后目标
    pub fn proximity_pair(
        subscription: &ProximitySubscription,
        group_name: &str,
        distance_meters: f64,
    ) -> [Notification; 2] {
        let threshold = subscription.distance_threshold_meters;
        let data_for = |counterpart: &str| {
            serde_json::json!({
                "group_id": subscription.group_id,
                "alert_id": subscription.id,
                "distance": distance_meters,
                "target_user_id": counterpart,
            })
        };

        [
            Notification {
                user_id: subscription.initiator_user_id.clone(),
                kind: PROXIMITY_ALERT_KIND.into(),
                title: "Proximity Alert".into(),
                body: format!(
                    "You are now within {threshold} meters of your tracked contact in {group_name}."
                ),
                data: data_for(&subscription.target_user_id),
                priority: NotificationPriority::High,
            },
            Notification {
                user_id: subscription.target_user_id.clone(),
                kind: PROXIMITY_ALERT_KIND.into(),
                title: "Proximity Alert".into(),
                body: format!("Someone in {group_name} is now within {threshold} meters of you."),
                data: data_for(&subscription.initiator_user_id),
                priority: NotificationPriority::High,
            },
        ]
    }
}

/// 通知的落地位置（通知服务）
///
/// 至少投递一次，消费方需要容忍重复。
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create_notification(&self, notification: &Notification) -> Result<(), AppError>;
}

pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn create_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                notification_id, user_id, kind, title, body, data, priority, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .bind(notification.priority.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            user_id = %notification.user_id,
            kind = %notification.kind,
            "Notification stored"
        );
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const MIN_THRESHOLD_METERS: i32 = 10;
pub const MAX_THRESHOLD_METERS: i32 = 10_000;
pub const DEFAULT_THRESHOLD_METERS: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Active,
    Triggered,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Triggered => "triggered",
            AlertStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "triggered" => Some(Self::Triggered),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// 接近提醒订阅：发起人希望在与目标距离小于阈值时收到提醒
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximitySubscription {
    pub id: Uuid,
    pub group_id: String,
    pub initiator_user_id: String,
    pub target_user_id: String,
    pub distance_threshold_meters: i32,
    pub status: AlertStatus,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_distance_meters: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProximitySubscription {
    pub fn new(group_id: &str, initiator_user_id: &str, target_user_id: &str, threshold: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            group_id: group_id.to_string(),
            initiator_user_id: initiator_user_id.to_string(),
            target_user_id: target_user_id.to_string(),
            distance_threshold_meters: threshold,
            status: AlertStatus::Active,
            last_triggered_at: None,
            last_distance_meters: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 订阅中与 user_id 相对的另一方
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        if self.initiator_user_id == user_id {
            Some(&self.target_user_id)
        } else if self.target_user_id == user_id {
            Some(&self.initiator_user_id)
        } else {
            None
        }
    }

    /// 是否与另一条订阅占用同一个 (群组, 发起人, 目标) 组合
    pub fn same_pairing(&self, other: &ProximitySubscription) -> bool {
        self.group_id == other.group_id
            && self.initiator_user_id == other.initiator_user_id
            && self.target_user_id == other.target_user_id
    }

    pub fn dismiss(&mut self) {
        self.status = AlertStatus::Dismissed;
        self.updated_at = Utc::now();
    }

    /// 用户手动重置
    pub fn reset(&mut self) {
        self.status = AlertStatus::Active;
        self.last_triggered_at = None;
        self.updated_at = Utc::now();
    }
}

pub fn validate_threshold(threshold: i32) -> Result<(), AppError> {
    if !(MIN_THRESHOLD_METERS..=MAX_THRESHOLD_METERS).contains(&threshold) {
        return Err(AppError::validation(format!(
            "距离阈值必须在 {MIN_THRESHOLD_METERS} 到 {MAX_THRESHOLD_METERS} 米之间"
        )));
    }
    Ok(())
}

/// 用户可以主动设置的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedStatus {
    Active,
    Dismissed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    pub distance_threshold_meters: Option<i32>,
    pub status: Option<RequestedStatus>,
}

/// 一次评估后要写回订阅的字段
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationUpdate {
    pub status: AlertStatus,
    pub last_distance_meters: f64,
    /// 为 None 时保留原值
    pub triggered_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterpart_resolution() {
        let sub = ProximitySubscription::new("g", "alice", "bob", 100);
        assert_eq!(sub.counterpart_of("alice"), Some("bob"));
        assert_eq!(sub.counterpart_of("bob"), Some("alice"));
        assert_eq!(sub.counterpart_of("carol"), None);
    }

    #[test]
    fn threshold_bounds() {
        assert!(validate_threshold(10).is_ok());
        assert!(validate_threshold(10_000).is_ok());
        assert!(validate_threshold(9).is_err());
        assert!(validate_threshold(10_001).is_err());
    }

    #[test]
    fn reset_clears_trigger_time() {
        let mut sub = ProximitySubscription::new("g", "alice", "bob", 100);
        sub.status = AlertStatus::Triggered;
        sub.last_triggered_at = Some(Utc::now());
        sub.reset();
        assert_eq!(sub.status, AlertStatus::Active);
        assert!(sub.last_triggered_at.is_none());
    }
}

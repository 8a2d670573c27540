use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::validation("纬度必须在 -90 到 90 之间"));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AppError::validation("经度必须在 -180 到 180 之间"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Wifi,
    Cellular,
    Offline,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Wifi => "wifi",
            ConnectionType::Cellular => "cellular",
            ConnectionType::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wifi" => Some(Self::Wifi),
            "cellular" => Some(Self::Cellular),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

/// 上报位置时附带的设备信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub device_id: Option<String>,
    pub battery_level: Option<f64>,
    pub connection_type: Option<ConnectionType>,
}

impl DeviceMetadata {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(level) = self.battery_level {
            if !level.is_finite() || !(0.0..=100.0).contains(&level) {
                return Err(AppError::validation("电量必须在 0 到 100 之间"));
            }
        }
        Ok(())
    }
}

/// 一次位置上报，写入后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub sample_id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub coordinates: Coordinates,
    pub device_id: Option<String>,
    pub battery_level: Option<f64>,
    pub connection_type: ConnectionType,
    /// 写入时计算的可见群组
    pub shared_with_group_ids: BTreeSet<String>,
}

impl LocationSample {
    pub fn new(
        user_id: &str,
        coordinates: Coordinates,
        device: DeviceMetadata,
        shared_with_group_ids: BTreeSet<String>,
    ) -> Self {
        Self {
            sample_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            coordinates,
            device_id: device.device_id,
            battery_level: device.battery_level,
            connection_type: device.connection_type.unwrap_or_default(),
            shared_with_group_ids,
        }
    }

    pub fn is_shared_with(&self, group_id: &str) -> bool {
        self.shared_with_group_ids.contains(group_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    #[default]
    Precise,
    Approximate,
    Hidden,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Precise => "precise",
            PrivacyLevel::Approximate => "approximate",
            PrivacyLevel::Hidden => "hidden",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "precise" => Some(Self::Precise),
            "approximate" => Some(Self::Approximate),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// 按隐私级别处理后返回给请求者的位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedSample {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub privacy_level: PrivacyLevel,
    /// 隐藏位置时仍然告知对方正在共享
    pub sharing_active: bool,
    pub coordinates: Option<Coordinates>,
    pub battery_level: Option<f64>,
    pub connection_type: ConnectionType,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::location::{ConnectionType, Coordinates, DeviceMetadata, LocationSample, PrivacyLevel};

/// 上报请求中的坐标，经纬度缺失时返回校验错误而不是反序列化错误
#[derive(Debug, Deserialize)]
pub struct CoordinatesPayload {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub altitude_accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub coordinates: Option<CoordinatesPayload>,
    pub device_id: Option<String>,
    pub battery_level: Option<f64>,
    pub connection_type: Option<String>,
}

impl UpdateLocationRequest {
    pub fn into_parts(self) -> Result<(Coordinates, DeviceMetadata), AppError> {
        let coords = self
            .coordinates
            .ok_or_else(|| AppError::validation("缺少坐标信息"))?;
        let latitude = coords.latitude.ok_or_else(|| AppError::validation("缺少纬度"))?;
        let longitude = coords.longitude.ok_or_else(|| AppError::validation("缺少经度"))?;

        let connection_type = match self.connection_type.as_deref() {
            None => None,
            Some(s) => Some(
                ConnectionType::parse(s).ok_or_else(|| AppError::validation("无效的网络类型"))?,
            ),
        };

        let coordinates = Coordinates {
            latitude,
            longitude,
            altitude: coords.altitude,
            accuracy: coords.accuracy,
            altitude_accuracy: coords.altitude_accuracy,
            heading: coords.heading,
            speed: coords.speed,
        };
        let device = DeviceMetadata {
            device_id: self.device_id,
            battery_level: self.battery_level,
            connection_type,
        };

        Ok((coordinates, device))
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateLocationResponse {
    pub location: LocationSample,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPrivacyRequest {
    pub privacy_level: String,
}

#[derive(Debug, Serialize)]
pub struct PrivacyResponse {
    pub privacy_level: PrivacyLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> UpdateLocationRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn missing_longitude_is_validation_error() {
        let req = request(r#"{"coordinates": {"latitude": 10.0}}"#);
        assert!(matches!(req.into_parts(), Err(AppError::Validation(_))));
    }

    #[test]
    fn rejects_unknown_connection_type() {
        let req = request(r#"{"coordinates": {"latitude": 1, "longitude": 2}, "connection_type": "satellite"}"#);
        assert!(matches!(req.into_parts(), Err(AppError::Validation(_))));
    }

    #[test]
    fn optional_fields_pass_through() {
        let req = request(
            r#"{"coordinates": {"latitude": 1.5, "longitude": 2.5, "speed": 3.0},
                "device_id": "phone-1", "battery_level": 80, "connection_type": "cellular"}"#,
        );
        let (coords, device) = req.into_parts().unwrap();
        assert_eq!(coords.latitude, 1.5);
        assert_eq!(coords.speed, Some(3.0));
        assert_eq!(coords.altitude, None);
        assert_eq!(device.device_id.as_deref(), Some("phone-1"));
        assert_eq!(device.connection_type, Some(ConnectionType::Cellular));
    }
}

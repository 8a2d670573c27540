use super::model::{Coordinates, LocationSample, PrivacyLevel, RedactedSample};
use crate::utils::round_coordinate;

/// 模糊位置保留的小数位数（约 1.1 公里）
pub const APPROXIMATE_DECIMALS: u32 = 2;

/// 按被查看者的隐私级别处理一条位置记录
///
/// 查看自己的位置时始终返回完整精度。
pub fn redact(sample: &LocationSample, privacy_level: PrivacyLevel, requester_is_subject: bool) -> RedactedSample {
    let coordinates = if requester_is_subject {
        Some(sample.coordinates)
    } else {
        match privacy_level {
            PrivacyLevel::Precise => Some(sample.coordinates),
            PrivacyLevel::Approximate => Some(Coordinates::new(
                round_coordinate(sample.coordinates.latitude, APPROXIMATE_DECIMALS),
                round_coordinate(sample.coordinates.longitude, APPROXIMATE_DECIMALS),
            )),
            PrivacyLevel::Hidden => None,
        }
    };

    RedactedSample {
        user_id: sample.user_id.clone(),
        timestamp: sample.timestamp,
        privacy_level,
        sharing_active: true,
        coordinates,
        battery_level: sample.battery_level,
        connection_type: sample.connection_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::model::DeviceMetadata;
    use std::collections::BTreeSet;

    fn sample() -> LocationSample {
        let coordinates = Coordinates {
            latitude: 37.774_929,
            longitude: -122.419_416,
            altitude: Some(16.0),
            accuracy: Some(5.0),
            altitude_accuracy: Some(3.0),
            heading: Some(90.0),
            speed: Some(1.4),
        };
        LocationSample::new("alice", coordinates, DeviceMetadata::default(), BTreeSet::new())
    }

    #[test]
    fn precise_is_unmodified() {
        let raw = sample();
        let view = redact(&raw, PrivacyLevel::Precise, false);
        assert_eq!(view.coordinates, Some(raw.coordinates));
        assert_eq!(view.timestamp, raw.timestamp);
    }

    #[test]
    fn approximate_rounds_and_drops_extras() {
        let view = redact(&sample(), PrivacyLevel::Approximate, false);
        let coords = view.coordinates.expect("approximate keeps coordinates");
        assert_eq!(coords.latitude, 37.77);
        assert_eq!(coords.longitude, -122.42);
        assert_eq!(coords.altitude, None);
        assert_eq!(coords.accuracy, None);
        assert_eq!(coords.heading, None);
        assert_eq!(coords.speed, None);
    }

    #[test]
    fn hidden_has_no_coordinates_but_reports_sharing() {
        let raw = sample();
        let view = redact(&raw, PrivacyLevel::Hidden, false);
        assert!(view.coordinates.is_none());
        assert!(view.sharing_active);
        assert_eq!(view.timestamp, raw.timestamp);
    }

    #[test]
    fn subject_always_sees_full_precision() {
        let raw = sample();
        for level in [PrivacyLevel::Precise, PrivacyLevel::Approximate, PrivacyLevel::Hidden] {
            let view = redact(&raw, level, true);
            assert_eq!(view.coordinates, Some(raw.coordinates));
        }
    }
}

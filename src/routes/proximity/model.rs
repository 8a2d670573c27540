use serde::Deserialize;

use crate::error::AppError;
use crate::proximity::{RequestedStatus, SubscriptionUpdate};

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub group_id: Option<String>,
    pub target_user_id: Option<String>,
    pub distance_threshold: Option<i32>,
}

impl CreateAlertRequest {
    pub fn required(self) -> Result<(String, String, Option<i32>), AppError> {
        let group_id = self
            .group_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::validation("缺少group_id"))?;
        let target_user_id = self
            .target_user_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::validation("缺少target_user_id"))?;
        Ok((group_id, target_user_id, self.distance_threshold))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertRequest {
    pub distance_threshold: Option<i32>,
    pub status: Option<String>,
}

impl TryFrom<UpdateAlertRequest> for SubscriptionUpdate {
    type Error = AppError;

    fn try_from(req: UpdateAlertRequest) -> Result<Self, Self::Error> {
        // 只允许设置为 active 或 dismissed，triggered 由系统维护
        let status = match req.status.as_deref() {
            None => None,
            Some("active") => Some(RequestedStatus::Active),
            Some("dismissed") => Some(RequestedStatus::Dismissed),
            Some(other) => return Err(AppError::validation(format!("无效的状态: {other}"))),
        };

        Ok(SubscriptionUpdate {
            distance_threshold_meters: req.distance_threshold,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggered_cannot_be_requested() {
        let req = UpdateAlertRequest {
            distance_threshold: None,
            status: Some("triggered".into()),
        };
        assert!(SubscriptionUpdate::try_from(req).is_err());
    }

    #[test]
    fn blank_target_is_rejected() {
        let req = CreateAlertRequest {
            group_id: Some("g1".into()),
            target_user_id: Some("  ".into()),
            distance_threshold: None,
        };
        assert!(matches!(req.required(), Err(AppError::Validation(_))));
    }
}

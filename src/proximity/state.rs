use super::model::AlertStatus;

/// 离开阈值后需要超出的倍数，防止 GPS 抖动导致反复触发
pub const HYSTERESIS_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// active -> triggered，需要通知双方
    Trigger,
    /// triggered -> active，不通知
    Reset,
    /// 状态不变
    Hold,
}

impl Transition {
    pub fn target(&self, current: AlertStatus) -> AlertStatus {
        match self {
            Transition::Trigger => AlertStatus::Triggered,
            Transition::Reset => AlertStatus::Active,
            Transition::Hold => current,
        }
    }
}

pub fn next_transition(status: AlertStatus, threshold_meters: f64, distance_meters: f64) -> Transition {
    match status {
        AlertStatus::Active if distance_meters <= threshold_meters => Transition::Trigger,
        AlertStatus::Triggered if distance_meters > threshold_meters * HYSTERESIS_FACTOR => Transition::Reset,
        _ => Transition::Hold,
    }
}

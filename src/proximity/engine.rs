//! 接近提醒评估
//!
//! 每次位置上报后针对上报用户执行一次：加载相关订阅，取对方在该群组
//! 共享范围内的最新位置，计算距离并推进状态机。每条订阅独立评估和保存，
//! 单条失败只记日志，不影响其余订阅。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::model::{EvaluationUpdate, ProximitySubscription};
use super::state::{Transition, next_transition};
use crate::error::AppError;
use crate::location::model::LocationSample;
use crate::notify::{Notification, NotificationSink};
use crate::store::{Backends, LocationStore, MembershipDirectory, SubscriptionStore};
use crate::utils::calculate_distance;

const FALLBACK_GROUP_NAME: &str = "a group";

/// 单条订阅的评估结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Triggered { distance: f64 },
    Reset { distance: f64 },
    Unchanged { distance: f64 },
    /// 对方在该群组内还没有位置
    NoCounterpartLocation,
    /// 状态已被并发的评估修改
    Superseded,
}

/// 一次评估的汇总，仅用于日志和测试
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub triggered: usize,
    pub reset: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl EvaluationSummary {
    fn record(&mut self, outcome: &Outcome) {
        self.evaluated += 1;
        match outcome {
            Outcome::Triggered { .. } => self.triggered += 1,
            Outcome::Reset { .. } => self.reset += 1,
            Outcome::Unchanged { .. } => {}
            Outcome::NoCounterpartLocation | Outcome::Superseded => self.skipped += 1,
        }
    }
}

pub struct ProximityEngine {
    locations: Arc<dyn LocationStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    directory: Arc<dyn MembershipDirectory>,
    notifier: Arc<dyn NotificationSink>,
}

impl ProximityEngine {
    pub fn new(backends: &Backends) -> Self {
        Self {
            locations: backends.locations.clone(),
            subscriptions: backends.subscriptions.clone(),
            directory: backends.directory.clone(),
            notifier: backends.notifier.clone(),
        }
    }

    /// 针对刚写入的位置评估上报用户的全部订阅
    ///
    /// 只有加载订阅失败才返回错误，单条订阅的失败计入 `failed`。
    pub async fn evaluate_for_sample(&self, sample: &LocationSample) -> Result<EvaluationSummary, AppError> {
        let mut summary = EvaluationSummary::default();

        // 共享范围是写入时计算的快照，不在范围内的群组的订阅直接跳过
        let scope: Vec<String> = sample.shared_with_group_ids.iter().cloned().collect();
        if scope.is_empty() {
            return Ok(summary);
        }

        let subscriptions = self
            .subscriptions
            .list_live_for_user(&sample.user_id, &scope)
            .await?;

        for subscription in &subscriptions {
            match self.evaluate_one(sample, subscription).await {
                Ok(outcome) => {
                    debug!(
                        subscription_id = %subscription.id,
                        user_id = %sample.user_id,
                        ?outcome,
                        "Proximity subscription evaluated"
                    );
                    summary.record(&outcome);
                }
                Err(e) => {
                    warn!(
                        subscription_id = %subscription.id,
                        user_id = %sample.user_id,
                        error = %e,
                        "Failed to evaluate proximity subscription"
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn evaluate_one(
        &self,
        sample: &LocationSample,
        subscription: &ProximitySubscription,
    ) -> Result<Outcome, AppError> {
        let Some(counterpart) = subscription.counterpart_of(&sample.user_id) else {
            return Ok(Outcome::NoCounterpartLocation);
        };

        let Some(other) = self
            .locations
            .latest_in_group(counterpart, &subscription.group_id)
            .await?
        else {
            return Ok(Outcome::NoCounterpartLocation);
        };

        let distance = calculate_distance(
            sample.coordinates.latitude,
            sample.coordinates.longitude,
            other.coordinates.latitude,
            other.coordinates.longitude,
        );

        let threshold = f64::from(subscription.distance_threshold_meters);
        let transition = next_transition(subscription.status, threshold, distance);

        let update = EvaluationUpdate {
            status: transition.target(subscription.status),
            last_distance_meters: distance,
            triggered_at: (transition == Transition::Trigger).then(Utc::now),
        };

        // 先通知后落库：通知失败时状态保持 active，下次上报会重试
        if transition == Transition::Trigger {
            self.notify_both(subscription, distance).await?;
        }

        let applied = self
            .subscriptions
            .apply_evaluation(subscription.id, subscription.status, update)
            .await?;
        if applied.is_none() {
            return Ok(Outcome::Superseded);
        }

        Ok(match transition {
            Transition::Trigger => {
                info!(
                    subscription_id = %subscription.id,
                    group_id = %subscription.group_id,
                    distance,
                    "Proximity alert triggered"
                );
                Outcome::Triggered { distance }
            }
            Transition::Reset => Outcome::Reset { distance },
            Transition::Hold => Outcome::Unchanged { distance },
        })
    }

    async fn notify_both(&self, subscription: &ProximitySubscription, distance: f64) -> Result<(), AppError> {
        let group_name = match self.directory.group(&subscription.group_id).await {
            Ok(Some(group)) => group.name,
            Ok(None) => FALLBACK_GROUP_NAME.to_string(),
            Err(e) => {
                warn!(group_id = %subscription.group_id, error = %e, "Failed to load group name");
                FALLBACK_GROUP_NAME.to_string()
            }
        };

        for notification in Notification::proximity_pair(subscription, &group_name, distance) {
            self.notifier.create_notification(&notification).await?;
        }
        Ok(())
    }
}


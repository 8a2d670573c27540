use std::sync::Arc;

use uuid::Uuid;

use super::model::{
    DEFAULT_THRESHOLD_METERS, ProximitySubscription, RequestedStatus, SubscriptionUpdate, validate_threshold,
};
use crate::error::AppError;
use crate::membership::GroupSnapshot;
use crate::store::{Backends, MembershipDirectory, SubscriptionStore};

/// 用户修改与引擎评估并发时的最大重试次数
const MAX_UPDATE_ATTEMPTS: usize = 3;

/// 接近提醒订阅的增删改查
pub struct AlertService {
    subscriptions: Arc<dyn SubscriptionStore>,
    directory: Arc<dyn MembershipDirectory>,
}

impl AlertService {
    pub fn new(backends: &Backends) -> Self {
        Self {
            subscriptions: backends.subscriptions.clone(),
            directory: backends.directory.clone(),
        }
    }

    async fn load_group(&self, group_id: &str) -> Result<GroupSnapshot, AppError> {
        self.directory
            .group(group_id)
            .await?
            .ok_or_else(|| AppError::not_found("群组"))
    }

    async fn load_owned(&self, id: Uuid, requester_id: &str) -> Result<ProximitySubscription, AppError> {
        let subscription = self
            .subscriptions
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found("接近提醒"))?;

        if subscription.initiator_user_id != requester_id {
            return Err(AppError::permission("只有创建者可以修改接近提醒"));
        }
        Ok(subscription)
    }

    pub async fn create(
        &self,
        group_id: &str,
        target_user_id: &str,
        threshold_meters: Option<i32>,
        requester_id: &str,
    ) -> Result<ProximitySubscription, AppError> {
        let threshold = threshold_meters.unwrap_or(DEFAULT_THRESHOLD_METERS);
        validate_threshold(threshold)?;

        if target_user_id == requester_id {
            return Err(AppError::validation("不能对自己创建接近提醒"));
        }

        let group = self.load_group(group_id).await?;
        if !group.is_active_member(requester_id) || !group.is_active_member(target_user_id) {
            return Err(AppError::permission("双方都必须是该群组的活跃成员"));
        }

        let subscription = ProximitySubscription::new(group_id, requester_id, target_user_id, threshold);
        self.subscriptions.create(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            group_id,
            threshold,
            "Proximity subscription created"
        );
        Ok(subscription)
    }

    pub async fn list(&self, group_id: &str, requester_id: &str) -> Result<Vec<ProximitySubscription>, AppError> {
        let group = self.load_group(group_id).await?;
        if !group.is_member(requester_id) {
            return Err(AppError::permission("不是该群组成员"));
        }

        self.subscriptions.list_for_member(group_id, requester_id).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        update: SubscriptionUpdate,
        requester_id: &str,
    ) -> Result<ProximitySubscription, AppError> {
        if let Some(threshold) = update.distance_threshold_meters {
            validate_threshold(threshold)?;
        }

        // 引擎可能在读取与写回之间修改状态，此时按最新状态重新应用
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut subscription = self.load_owned(id, requester_id).await?;
            let expected = subscription.status;

            if let Some(threshold) = update.distance_threshold_meters {
                subscription.distance_threshold_meters = threshold;
                subscription.updated_at = chrono::Utc::now();
            }

            match update.status {
                Some(RequestedStatus::Dismissed) => subscription.dismiss(),
                Some(RequestedStatus::Active) => subscription.reset(),
                None => {}
            }

            // 从 dismissed 重置时可能与已有订阅冲突，由存储层返回 Conflict
            if self.subscriptions.update(&subscription, expected).await? {
                return Ok(subscription);
            }
            tracing::debug!(subscription_id = %id, "Subscription changed concurrently, retrying update");
        }

        Err(AppError::conflict("接近提醒正在被修改，请重试"))
    }

    pub async fn delete(&self, id: Uuid, requester_id: &str) -> Result<(), AppError> {
        self.load_owned(id, requester_id).await?;

        if !self.subscriptions.delete(id).await? {
            return Err(AppError::not_found("接近提醒"));
        }
        Ok(())
    }
}

//! 存储层
//!
//! 核心逻辑只依赖这里定义的 trait，生产环境使用 PostgreSQL 实现，
//! 测试使用内存实现（`test-utils` 特性）。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::location::model::{LocationSample, PrivacyLevel};
use crate::membership::{GroupMembership, GroupSnapshot};
use crate::notify::NotificationSink;
use crate::proximity::model::{AlertStatus, EvaluationUpdate, ProximitySubscription};
use crate::recorder::TimeSeriesSink;

pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn insert_sample(&self, sample: &LocationSample) -> Result<(), AppError>;

    /// 用户最新的一条位置（不限共享范围）
    async fn latest_for_user(&self, user_id: &str) -> Result<Option<LocationSample>, AppError>;

    /// 用户在指定群组共享范围内最新的一条位置
    async fn latest_in_group(&self, user_id: &str, group_id: &str) -> Result<Option<LocationSample>, AppError>;

    /// 用户在任一指定群组共享范围内最新的一条位置
    async fn latest_in_any_group(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<Option<LocationSample>, AppError>;

    /// 时间范围内的历史位置，按时间升序；group_ids 为 None 时不按群组过滤
    async fn history(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        group_ids: Option<&[String]>,
    ) -> Result<Vec<LocationSample>, AppError>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// 已存在未关闭的相同组合时返回 Conflict
    async fn create(&self, subscription: &ProximitySubscription) -> Result<(), AppError>;

    async fn find(&self, id: Uuid) -> Result<Option<ProximitySubscription>, AppError>;

    /// 群组内用户作为发起人或目标的全部订阅
    async fn list_for_member(&self, group_id: &str, user_id: &str) -> Result<Vec<ProximitySubscription>, AppError>;

    /// 用户参与的、未关闭的、属于指定群组的订阅
    async fn list_live_for_user(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<Vec<ProximitySubscription>, AppError>;

    /// 仅当当前状态等于 expected 时写入评估结果，状态已被并发修改时返回 None
    async fn apply_evaluation(
        &self,
        id: Uuid,
        expected: AlertStatus,
        update: EvaluationUpdate,
    ) -> Result<Option<ProximitySubscription>, AppError>;

    /// 保存用户修改（阈值、关闭、重置），仅当当前状态等于 expected 时生效；
    /// 订阅不存在或状态已被并发修改时返回 false
    async fn update(&self, subscription: &ProximitySubscription, expected: AlertStatus) -> Result<bool, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// 群组服务提供的成员关系查询
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<GroupMembership>, AppError>;

    async fn group(&self, group_id: &str) -> Result<Option<GroupSnapshot>, AppError>;
}

#[async_trait]
pub trait PrivacyStore: Send + Sync {
    /// 未设置时为 precise
    async fn privacy_level(&self, user_id: &str) -> Result<PrivacyLevel, AppError>;

    async fn set_privacy_level(&self, user_id: &str, level: PrivacyLevel) -> Result<(), AppError>;
}

/// 服务依赖的全部外部组件
#[derive(Clone)]
pub struct Backends {
    pub locations: Arc<dyn LocationStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub directory: Arc<dyn MembershipDirectory>,
    pub privacy: Arc<dyn PrivacyStore>,
    pub notifier: Arc<dyn NotificationSink>,
    pub recorder: Option<Arc<dyn TimeSeriesSink>>,
}

//! 内存存储实现，仅用于测试
//!
//! 行为与 PostgreSQL 实现保持一致，包括未关闭订阅的唯一性约束和
//! 按状态条件更新。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Backends, LocationStore, MembershipDirectory, PrivacyStore, SubscriptionStore};
use crate::error::AppError;
use crate::location::model::{LocationSample, PrivacyLevel};
use crate::membership::{GroupMember, GroupMembership, GroupSnapshot, GroupStatus, MemberStatus};
use crate::notify::{Notification, NotificationSink};
use crate::proximity::model::{AlertStatus, EvaluationUpdate, ProximitySubscription};
use crate::recorder::TimeSeriesSink;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryLocationStore {
    // 每个用户的位置按写入顺序保存
    samples: RwLock<HashMap<String, Vec<LocationSample>>>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn latest_matching<F>(&self, user_id: &str, pred: F) -> Option<LocationSample>
    where
        F: Fn(&LocationSample) -> bool,
    {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples
            .get(user_id)?
            .iter()
            .filter(|s| pred(s))
            // 时间相同时取后写入的
            .fold(None::<&LocationSample>, |best, s| match best {
                Some(b) if b.timestamp > s.timestamp => Some(b),
                _ => Some(s),
            })
            .cloned()
    }

    pub fn sample_count(&self, user_id: &str) -> usize {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples.get(user_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn insert_sample(&self, sample: &LocationSample) -> Result<(), AppError> {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        samples
            .entry(sample.user_id.clone())
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn latest_for_user(&self, user_id: &str) -> Result<Option<LocationSample>, AppError> {
        Ok(self.latest_matching(user_id, |_| true))
    }

    async fn latest_in_group(&self, user_id: &str, group_id: &str) -> Result<Option<LocationSample>, AppError> {
        Ok(self.latest_matching(user_id, |s| s.is_shared_with(group_id)))
    }

    async fn latest_in_any_group(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<Option<LocationSample>, AppError> {
        Ok(self.latest_matching(user_id, |s| group_ids.iter().any(|g| s.is_shared_with(g))))
    }

    async fn history(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        group_ids: Option<&[String]>,
    ) -> Result<Vec<LocationSample>, AppError> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<LocationSample> = samples
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .filter(|s| group_ids.is_none_or(|ids| ids.iter().any(|g| s.is_shared_with(g))))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.timestamp);
        Ok(found)
    }
}

#[derive(Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<HashMap<Uuid, ProximitySubscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn has_live_duplicate(map: &HashMap<Uuid, ProximitySubscription>, sub: &ProximitySubscription) -> bool {
        sub.status != AlertStatus::Dismissed
            && map.values().any(|other| {
                other.id != sub.id && other.status != AlertStatus::Dismissed && other.same_pairing(sub)
            })
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn create(&self, sub: &ProximitySubscription) -> Result<(), AppError> {
        let mut map = lock(&self.subscriptions);
        if Self::has_live_duplicate(&map, sub) {
            return Err(AppError::conflict("该成员在此群组中已有未关闭的接近提醒"));
        }
        map.insert(sub.id, sub.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ProximitySubscription>, AppError> {
        Ok(lock(&self.subscriptions).get(&id).cloned())
    }

    async fn list_for_member(&self, group_id: &str, user_id: &str) -> Result<Vec<ProximitySubscription>, AppError> {
        let map = lock(&self.subscriptions);
        let mut subs: Vec<_> = map
            .values()
            .filter(|s| s.group_id == group_id && s.counterpart_of(user_id).is_some())
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.created_at);
        Ok(subs)
    }

    async fn list_live_for_user(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<Vec<ProximitySubscription>, AppError> {
        let map = lock(&self.subscriptions);
        Ok(map
            .values()
            .filter(|s| s.status != AlertStatus::Dismissed)
            .filter(|s| s.counterpart_of(user_id).is_some())
            .filter(|s| group_ids.contains(&s.group_id))
            .cloned()
            .collect())
    }

    async fn apply_evaluation(
        &self,
        id: Uuid,
        expected: AlertStatus,
        update: EvaluationUpdate,
    ) -> Result<Option<ProximitySubscription>, AppError> {
        let mut map = lock(&self.subscriptions);
        let Some(sub) = map.get_mut(&id) else {
            return Ok(None);
        };
        if sub.status != expected {
            return Ok(None);
        }
        sub.status = update.status;
        sub.last_distance_meters = Some(update.last_distance_meters);
        if let Some(at) = update.triggered_at {
            sub.last_triggered_at = Some(at);
        }
        sub.updated_at = Utc::now();
        Ok(Some(sub.clone()))
    }

    async fn update(&self, sub: &ProximitySubscription, expected: AlertStatus) -> Result<bool, AppError> {
        let mut map = lock(&self.subscriptions);
        if map.get(&sub.id).is_none_or(|current| current.status != expected) {
            return Ok(false);
        }
        if Self::has_live_duplicate(&map, sub) {
            return Err(AppError::conflict("该成员在此群组中已有未关闭的接近提醒"));
        }
        map.insert(sub.id, sub.clone());
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(lock(&self.subscriptions).remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    groups: RwLock<HashMap<String, GroupSnapshot>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&self, group_id: &str, name: &str, location_sharing_required: bool) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        groups.insert(
            group_id.to_string(),
            GroupSnapshot {
                group_id: group_id.to_string(),
                name: name.to_string(),
                status: GroupStatus::Active,
                location_sharing_required,
                members: Vec::new(),
            },
        );
    }

    pub fn set_group_status(&self, group_id: &str, status: GroupStatus) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(group) = groups.get_mut(group_id) {
            group.status = status;
        }
    }

    pub fn set_location_sharing(&self, group_id: &str, required: bool) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(group) = groups.get_mut(group_id) {
            group.location_sharing_required = required;
        }
    }

    /// 添加成员或修改已有成员的状态
    pub fn set_member(&self, group_id: &str, user_id: &str, status: MemberStatus) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let Some(group) = groups.get_mut(group_id) else {
            return;
        };
        match group.members.iter_mut().find(|m| m.user_id == user_id) {
            Some(member) => member.status = status,
            None => group.members.push(GroupMember {
                user_id: user_id.to_string(),
                status,
            }),
        }
    }
}

#[async_trait]
impl MembershipDirectory for MemoryDirectory {
    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<GroupMembership>, AppError> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        Ok(groups.values().filter_map(|g| g.membership_of(user_id)).collect())
    }

    async fn group(&self, group_id: &str) -> Result<Option<GroupSnapshot>, AppError> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        Ok(groups.get(group_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryPrivacyStore {
    levels: Mutex<HashMap<String, PrivacyLevel>>,
}

impl MemoryPrivacyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrivacyStore for MemoryPrivacyStore {
    async fn privacy_level(&self, user_id: &str) -> Result<PrivacyLevel, AppError> {
        Ok(lock(&self.levels).get(user_id).copied().unwrap_or_default())
    }

    async fn set_privacy_level(&self, user_id: &str, level: PrivacyLevel) -> Result<(), AppError> {
        lock(&self.levels).insert(user_id.to_string(), level);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn create_notification(&self, notification: &Notification) -> Result<(), AppError> {
        lock(&self.sent).push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTimeSeries {
    points: Mutex<Vec<LocationSample>>,
}

impl MemoryTimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> Vec<LocationSample> {
        lock(&self.points).clone()
    }
}

#[async_trait]
impl TimeSeriesSink for MemoryTimeSeries {
    async fn record_point(&self, sample: &LocationSample) -> Result<(), AppError> {
        lock(&self.points).push(sample.clone());
        Ok(())
    }
}

/// 一整套内存组件，保留具体类型以便测试直接读写
#[derive(Clone, Default)]
pub struct MemoryBackends {
    pub locations: Arc<MemoryLocationStore>,
    pub subscriptions: Arc<MemorySubscriptionStore>,
    pub directory: Arc<MemoryDirectory>,
    pub privacy: Arc<MemoryPrivacyStore>,
    pub notifier: Arc<MemoryNotificationSink>,
    pub recorder: Arc<MemoryTimeSeries>,
}

impl MemoryBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backends(&self) -> Backends {
        Backends {
            locations: self.locations.clone(),
            subscriptions: self.subscriptions.clone(),
            directory: self.directory.clone(),
            privacy: self.privacy.clone(),
            notifier: self.notifier.clone(),
            recorder: Some(self.recorder.clone()),
        }
    }
}

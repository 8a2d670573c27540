use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use super::model::{Coordinates, DeviceMetadata, LocationSample, PrivacyLevel, RedactedSample};
use super::redact::redact;
use super::scope::{SharingScope, resolve_sharing_scope};
use crate::background::{BackgroundPolicy, BackgroundWork, spawn_with_policy};
use crate::error::AppError;
use crate::membership::shared_active_groups;
use crate::proximity::ProximityEngine;
use crate::recorder::TimeSeriesSink;
use crate::store::{Backends, LocationStore, MembershipDirectory, PrivacyStore};

/// 上报结果：已写入的位置和派发出去的后台任务
pub struct Ingested {
    pub sample: LocationSample,
    pub background: BackgroundWork,
}

pub struct LocationService {
    locations: Arc<dyn LocationStore>,
    directory: Arc<dyn MembershipDirectory>,
    privacy: Arc<dyn PrivacyStore>,
    recorder: Option<Arc<dyn TimeSeriesSink>>,
    engine: Arc<ProximityEngine>,
    policy: BackgroundPolicy,
}

impl LocationService {
    pub fn new(backends: &Backends, engine: Arc<ProximityEngine>, policy: BackgroundPolicy) -> Self {
        Self {
            locations: backends.locations.clone(),
            directory: backends.directory.clone(),
            privacy: backends.privacy.clone(),
            recorder: backends.recorder.clone(),
            engine,
            policy,
        }
    }

    /// 计算用户当前的共享范围
    pub async fn sharing_scope(&self, user_id: &str) -> Result<SharingScope, AppError> {
        let memberships = self.directory.memberships_for_user(user_id).await?;
        Ok(resolve_sharing_scope(&memberships))
    }

    /// 写入一次位置上报
    ///
    /// 时序记录和接近提醒评估在后台执行，失败不会影响返回值。
    pub async fn ingest(
        &self,
        user_id: &str,
        coordinates: Coordinates,
        device: DeviceMetadata,
    ) -> Result<Ingested, AppError> {
        coordinates.validate()?;
        device.validate()?;

        let scope = self.sharing_scope(user_id).await?;
        let sample = LocationSample::new(user_id, coordinates, device, scope.into_inner());
        self.locations.insert_sample(&sample).await?;

        debug!(
            user_id,
            sample_id = %sample.sample_id,
            groups = sample.shared_with_group_ids.len(),
            "Location sample stored"
        );

        let background = self.dispatch_background(&sample);
        Ok(Ingested { sample, background })
    }

    fn dispatch_background(&self, sample: &LocationSample) -> BackgroundWork {
        let mut work = BackgroundWork::default();
        let shared = Arc::new(sample.clone());

        if let Some(recorder) = &self.recorder {
            let recorder = recorder.clone();
            let sample = shared.clone();
            work.push(spawn_with_policy("timeseries_record", self.policy, move || {
                let recorder = recorder.clone();
                let sample = sample.clone();
                async move { recorder.record_point(&sample).await }
            }));
        }

        let engine = self.engine.clone();
        work.push(spawn_with_policy("proximity_evaluate", self.policy, move || {
            let engine = engine.clone();
            let sample = shared.clone();
            async move {
                let summary = engine.evaluate_for_sample(&sample).await?;
                debug!(user_id = %sample.user_id, ?summary, "Proximity evaluation finished");
                Ok(())
            }
        }));

        work
    }

    /// 查看某个用户的当前位置
    pub async fn current_location(&self, target_user_id: &str, requester_id: &str) -> Result<RedactedSample, AppError> {
        let is_self = target_user_id == requester_id;

        let sample = if is_self {
            self.locations.latest_for_user(target_user_id).await?
        } else {
            let shared = self.shared_groups(target_user_id, requester_id).await?;
            if shared.is_empty() {
                return Err(AppError::permission("与该用户没有共同的活跃群组"));
            }
            let shared: Vec<String> = shared.into_iter().collect();
            self.locations.latest_in_any_group(target_user_id, &shared).await?
        };

        let sample = sample.ok_or_else(|| AppError::not_found("位置"))?;
        let level = self.privacy.privacy_level(target_user_id).await?;
        Ok(redact(&sample, level, is_self))
    }

    /// 群组内所有活跃成员的最新位置
    ///
    /// 单个成员查询失败只记录日志并跳过。
    pub async fn group_locations(&self, group_id: &str, requester_id: &str) -> Result<Vec<RedactedSample>, AppError> {
        let group = self
            .directory
            .group(group_id)
            .await?
            .ok_or_else(|| AppError::not_found("群组"))?;

        if !group.is_active_member(requester_id) {
            return Err(AppError::permission("不是该群组的活跃成员"));
        }

        let lookups = group
            .active_member_ids()
            .map(|member_id| self.member_location(group_id, member_id, requester_id));

        let mut locations = Vec::new();
        for (member_id, result) in group.active_member_ids().zip(join_all(lookups).await) {
            match result {
                Ok(Some(view)) => locations.push(view),
                Ok(None) => debug!(group_id, member_id, "No shared location for member"),
                Err(e) => warn!(group_id, member_id, error = %e, "Failed to load member location"),
            }
        }

        debug!(group_id, count = locations.len(), "Group locations loaded");
        Ok(locations)
    }

    async fn member_location(
        &self,
        group_id: &str,
        member_id: &str,
        requester_id: &str,
    ) -> Result<Option<RedactedSample>, AppError> {
        let Some(sample) = self.locations.latest_in_group(member_id, group_id).await? else {
            return Ok(None);
        };
        let level = self.privacy.privacy_level(member_id).await?;
        Ok(Some(redact(&sample, level, member_id == requester_id)))
    }

    /// 历史位置
    ///
    /// 查看他人时只返回通过共同群组共享过的位置；指定群组时该群组必须是共同群组。
    pub async fn location_history(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        group_id: Option<&str>,
        requester_id: &str,
    ) -> Result<Vec<RedactedSample>, AppError> {
        if start > end {
            return Err(AppError::validation("开始时间不能晚于结束时间"));
        }

        let is_self = user_id == requester_id;

        let filter: Option<Vec<String>> = if is_self {
            group_id.map(|g| vec![g.to_string()])
        } else {
            let shared = self.shared_groups(user_id, requester_id).await?;
            match group_id {
                Some(g) if shared.contains(g) => Some(vec![g.to_string()]),
                Some(_) => return Err(AppError::permission("与该用户没有共同的该群组")),
                None if shared.is_empty() => {
                    return Err(AppError::permission("与该用户没有共同的活跃群组"));
                }
                None => Some(shared.into_iter().collect()),
            }
        };

        let samples = self
            .locations
            .history(user_id, start, end, filter.as_deref())
            .await?;
        let level = self.privacy.privacy_level(user_id).await?;

        Ok(samples.iter().map(|s| redact(s, level, is_self)).collect())
    }

    pub async fn set_privacy(&self, user_id: &str, level: PrivacyLevel) -> Result<PrivacyLevel, AppError> {
        self.privacy.set_privacy_level(user_id, level).await?;
        debug!(user_id, level = level.as_str(), "Privacy level updated");
        Ok(level)
    }

    async fn shared_groups(&self, subject_id: &str, requester_id: &str) -> Result<BTreeSet<String>, AppError> {
        let subject = self.directory.memberships_for_user(subject_id).await?;
        let requester = self.directory.memberships_for_user(requester_id).await?;
        Ok(shared_active_groups(&subject, &requester))
    }
}

//! 群组成员关系（由群组服务维护，这里只读）

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Active,
    Inactive,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
    Muted,
}

impl GroupStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl MemberStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "muted" => Some(Self::Muted),
            _ => None,
        }
    }
}

/// 某个用户在某个群组中的成员关系
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: String,
    pub group_name: String,
    pub group_status: GroupStatus,
    pub member_status: MemberStatus,
    pub location_sharing_required: bool,
}

impl GroupMembership {
    /// 群组与成员均处于活跃状态
    pub fn is_active(&self) -> bool {
        self.group_status == GroupStatus::Active && self.member_status == MemberStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: String,
    pub status: MemberStatus,
}

/// 群组及其成员列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group_id: String,
    pub name: String,
    pub status: GroupStatus,
    pub location_sharing_required: bool,
    pub members: Vec<GroupMember>,
}

impl GroupSnapshot {
    pub fn member(&self, user_id: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member(user_id).is_some()
    }

    pub fn is_active_member(&self, user_id: &str) -> bool {
        self.status == GroupStatus::Active
            && self
                .member(user_id)
                .is_some_and(|m| m.status == MemberStatus::Active)
    }

    pub fn active_member_ids(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter(|m| m.status == MemberStatus::Active)
            .map(|m| m.user_id.as_str())
    }

    /// 从群组视角生成某个成员的成员关系
    pub fn membership_of(&self, user_id: &str) -> Option<GroupMembership> {
        self.member(user_id).map(|m| GroupMembership {
            group_id: self.group_id.clone(),
            group_name: self.name.clone(),
            group_status: self.status,
            member_status: m.status,
            location_sharing_required: self.location_sharing_required,
        })
    }
}

/// 两个用户共同所在、且双方都活跃的群组
pub fn shared_active_groups(a: &[GroupMembership], b: &[GroupMembership]) -> BTreeSet<String> {
    let b_active: BTreeSet<&str> = b
        .iter()
        .filter(|m| m.is_active())
        .map(|m| m.group_id.as_str())
        .collect();

    a.iter()
        .filter(|m| m.is_active() && b_active.contains(m.group_id.as_str()))
        .map(|m| m.group_id.clone())
        .collect()
}

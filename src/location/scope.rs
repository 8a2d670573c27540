use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::membership::GroupMembership;

/// 一次上报的共享范围：这次位置对哪些群组可见
///
/// 每次上报时根据当时的成员关系计算一次，随后沿调用链传递。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingScope(BTreeSet<String>);

impl SharingScope {
    pub fn contains(&self, group_id: &str) -> bool {
        self.0.contains(group_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn into_inner(self) -> BTreeSet<String> {
        self.0
    }
}

impl From<BTreeSet<String>> for SharingScope {
    fn from(groups: BTreeSet<String>) -> Self {
        Self(groups)
    }
}

/// 计算用户的共享范围
///
/// 群组活跃、成员活跃且群组要求共享位置时，该群组才在范围内。
pub fn resolve_sharing_scope(memberships: &[GroupMembership]) -> SharingScope {
    SharingScope(
        memberships
            .iter()
            .filter(|m| m.is_active() && m.location_sharing_required)
            .map(|m| m.group_id.clone())
            .collect(),
    )
}

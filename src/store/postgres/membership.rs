use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use super::decode_error;
use crate::error::AppError;
use crate::membership::{GroupMember, GroupMembership, GroupSnapshot, GroupStatus, MemberStatus};
use crate::store::MembershipDirectory;

#[derive(Debug, FromRow)]
struct MembershipRow {
    group_id: String,
    name: String,
    group_status: String,
    member_status: String,
    location_sharing_required: bool,
}

#[derive(Debug, FromRow)]
struct GroupRow {
    group_id: String,
    name: String,
    status: String,
    location_sharing_required: bool,
}

#[derive(Debug, FromRow)]
struct MemberRow {
    user_id: String,
    status: String,
}

fn group_status(s: &str) -> Result<GroupStatus, AppError> {
    GroupStatus::parse(s).ok_or_else(|| decode_error("group status", s))
}

fn member_status(s: &str) -> Result<MemberStatus, AppError> {
    MemberStatus::parse(s).ok_or_else(|| decode_error("member status", s))
}

/// 直接读取群组服务的 groups / group_members 表，只读
pub struct PgMembershipDirectory {
    pool: PgPool,
}

impl PgMembershipDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipDirectory for PgMembershipDirectory {
    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<GroupMembership>, AppError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT
                g.group_id, g.name, g.status AS group_status,
                m.status AS member_status, g.location_sharing_required
            FROM group_members m
            JOIN groups g ON g.group_id = m.group_id
            WHERE m.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok::<_, AppError>(GroupMembership {
                    group_status: group_status(&row.group_status)?,
                    member_status: member_status(&row.member_status)?,
                    group_id: row.group_id,
                    group_name: row.name,
                    location_sharing_required: row.location_sharing_required,
                })
            })
            .collect()
    }

    async fn group(&self, group_id: &str) -> Result<Option<GroupSnapshot>, AppError> {
        let Some(group) = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT group_id, name, status, location_sharing_required
            FROM groups
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let members = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT user_id, status
            FROM group_members
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            Ok(GroupMember {
                status: member_status(&row.status)?,
                user_id: row.user_id,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

        Ok(Some(GroupSnapshot {
            status: group_status(&group.status)?,
            group_id: group.group_id,
            name: group.name,
            location_sharing_required: group.location_sharing_required,
            members,
        }))
    }
}

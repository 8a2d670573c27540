// PostgreSQL 存储实现

mod location;
mod membership;
mod privacy;
mod subscription;

pub use location::PgLocationStore;
pub use membership::PgMembershipDirectory;
pub use privacy::PgPrivacyStore;
pub use subscription::PgSubscriptionStore;

use crate::error::AppError;

/// 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";

/// 把唯一约束冲突转换为 Conflict，其余保持数据库错误
pub(crate) fn map_unique_violation(e: sqlx::Error, msg: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return AppError::conflict(msg);
        }
    }
    AppError::Database(e)
}

pub(crate) fn decode_error(what: &str, value: &str) -> AppError {
    AppError::Database(sqlx::Error::Decode(
        format!("unknown {}: {}", what, value).into(),
    ))
}

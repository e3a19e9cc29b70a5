//! 模式能力探测 / Schema capability probe
//!
//! 管理员读标志的列名在不同部署里不一致（历史迁移留下的），启动时探测一次，
//! 产出明确的枚举，而不是每个请求去反射。探不到就退回咨询师侧标志，绝不
//! 因此抛 500。
//! The admin read-flag column name varies across deployments (migration
//! history). Probe once at startup into an explicit enum instead of
//! per-request reflection. When absent, fall back to the counselor-side
//! flag; never surface a 500 for this.

use std::sync::OnceLock;

use sqlx::PgPool;
use tracing::{info, warn};

/// 管理员读标志实际列 / Physical admin read-flag column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminReadColumn {
    AdminIsRead,
    IsAdminRead,
    AdminRead,
    /// 列不存在，借用咨询师侧标志 / Column absent, borrow the counselor-side flag
    CounselorFallback,
}

impl AdminReadColumn {
    /// SELECT 里使用的列名 / Column name used in SELECTs
    pub fn column(&self) -> &'static str {
        match self {
            AdminReadColumn::AdminIsRead => "admin_is_read",
            AdminReadColumn::IsAdminRead => "is_admin_read",
            AdminReadColumn::AdminRead => "admin_read",
            AdminReadColumn::CounselorFallback => "counselor_is_read",
        }
    }
}

// 历史上出现过的候选列名，按出现频率排序
// Candidate names seen historically, most common first
const CANDIDATES: &[(&str, AdminReadColumn)] = &[
    ("admin_is_read", AdminReadColumn::AdminIsRead),
    ("is_admin_read", AdminReadColumn::IsAdminRead),
    ("admin_read", AdminReadColumn::AdminRead),
];

static ADMIN_READ_COLUMN: OnceLock<AdminReadColumn> = OnceLock::new();

/// 启动时探测一次 / Probe once at startup
pub async fn probe_admin_read_column(pool: &PgPool) -> AdminReadColumn {
    let found: Result<Vec<(String,)>, sqlx::Error> = sqlx::query_as(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_name = 'messages'",
    )
    .fetch_all(pool)
    .await;

    let resolved = match found {
        Ok(rows) => {
            let names: Vec<String> = rows.into_iter().map(|(n,)| n).collect();
            CANDIDATES
                .iter()
                .find(|(name, _)| names.iter().any(|n| n == name))
                .map(|(_, col)| *col)
                .unwrap_or(AdminReadColumn::CounselorFallback)
        }
        Err(e) => {
            warn!("模式探测失败，使用回退列 / schema probe failed, using fallback: {e}");
            AdminReadColumn::CounselorFallback
        }
    };
    info!(
        "管理员读标志列 / admin read-flag column: {}",
        resolved.column()
    );
    let _ = ADMIN_READ_COLUMN.set(resolved);
    resolved
}

/// 探测结果；未探测时取回退列 / Probe result; fallback when not yet probed
pub fn admin_read_column() -> AdminReadColumn {
    *ADMIN_READ_COLUMN
        .get()
        .unwrap_or(&AdminReadColumn::CounselorFallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_resolution_order() {
        let names = ["id", "content", "is_admin_read", "admin_read"];
        let resolved = CANDIDATES
            .iter()
            .find(|(name, _)| names.contains(name))
            .map(|(_, col)| *col)
            .unwrap_or(AdminReadColumn::CounselorFallback);
        assert_eq!(resolved, AdminReadColumn::IsAdminRead);
    }

    #[test]
    fn test_fallback_when_absent() {
        let names = ["id", "content", "counselor_is_read"];
        let resolved = CANDIDATES
            .iter()
            .find(|(name, _)| names.contains(name))
            .map(|(_, col)| *col)
            .unwrap_or(AdminReadColumn::CounselorFallback);
        assert_eq!(resolved, AdminReadColumn::CounselorFallback);
        assert_eq!(resolved.column(), "counselor_is_read");
    }
}

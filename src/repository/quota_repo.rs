// ==========================================
// 住院医师排班系统 - 配额进度仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: completed_count 的权威来源是 assignment 表,
//       refresh_completed_from_schedule 按落库指派幂等重算
// ==========================================

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::domain::quota::QuotaTarget;
use crate::domain::types::ShiftCategory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::enum_from_text;

// ==========================================
// QuotaRepository - 配额进度仓储
// ==========================================
pub struct QuotaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QuotaRepository {
    /// 创建新的配额仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量写入某住院医师的配额目标 (注册时派生,单事务)
    pub fn insert_targets(&self, targets: &[QuotaTarget]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for target in targets {
            tx.execute(
                r#"
                INSERT INTO quota_target (resident_id, category, target_count, completed_count)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (resident_id, category)
                DO UPDATE SET target_count = excluded.target_count
                "#,
                params![
                    target.resident_id,
                    target.category.to_string(),
                    target.target_count,
                    target.completed_count,
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 查询某住院医师的配额进度 (按类别文本序)
    pub fn find_by_resident(&self, resident_id: &str) -> RepositoryResult<Vec<QuotaTarget>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT resident_id, category, target_count, completed_count
            FROM quota_target
            WHERE resident_id = ?1
            ORDER BY category
            "#,
        )?;

        let raw = stmt
            .query_map(params![resident_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, i32>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(resident_id, category, target_count, completed_count)| {
                Ok(QuotaTarget {
                    resident_id,
                    category: enum_from_text::<ShiftCategory>("category", &category)?,
                    target_count,
                    completed_count,
                })
            })
            .collect()
    }

    /// 按指定排班表的落库指派重算 completed_count (幂等)
    ///
    /// # 参数
    /// - schedule_id: 排班表ID
    ///
    /// # 返回
    /// - Ok(rows): 被更新的配额行数
    pub fn refresh_completed_from_schedule(&self, schedule_id: &str) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let rows = tx.execute(
            r#"
            UPDATE quota_target SET completed_count = (
                SELECT COUNT(*)
                FROM assignment a
                WHERE a.schedule_id = ?1
                  AND a.resident_id = quota_target.resident_id
                  AND a.category = quota_target.category
            )
            WHERE EXISTS (
                SELECT 1 FROM assignment a
                WHERE a.schedule_id = ?1
                  AND a.resident_id = quota_target.resident_id
            ) OR completed_count != 0
            "#,
            params![schedule_id],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(rows)
    }
}

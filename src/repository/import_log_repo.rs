// ==========================================
// 收获记录导入系统 - 导入日志仓储
// ==========================================
// 职责: harvest_import_log 表的写入与查询
// 用途: 文件导入时跳过已导入路径；列出最近批次
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::harvest::ImportBatch;
use crate::domain::types::RejectReason;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ImportLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportLogRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入一条导入日志
    pub fn insert(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let rejected_json = serde_json::to_string(&batch.rejected).map_err(|e| {
            RepositoryError::FieldValueError {
                field: "rejected".to_string(),
                message: e.to_string(),
            }
        })?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO harvest_import_log (
                batch_id, source_path, file_name, encoding,
                attempted, inserted, skipped, rejected_json, imported_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                batch.batch_id,
                batch.source_path,
                batch.file_name,
                batch.encoding,
                batch.attempted as i64,
                batch.inserted as i64,
                batch.skipped as i64,
                rejected_json,
                batch.imported_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 指定路径是否已经导入过
    pub fn has_been_imported(&self, source_path: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM harvest_import_log WHERE source_path = ?1 LIMIT 1",
                params![source_path],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    /// 查询最近的导入批次（导入时间倒序）
    pub fn recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, source_path, file_name, encoding,
                   attempted, inserted, skipped, rejected_json, imported_at
            FROM harvest_import_log
            ORDER BY imported_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let rejected_json: String = row.get(7)?;
                let imported_at: String = row.get(8)?;
                Ok((
                    ImportBatch {
                        batch_id: row.get(0)?,
                        source_path: row.get(1)?,
                        file_name: row.get(2)?,
                        encoding: row.get(3)?,
                        attempted: row.get::<_, i64>(4)? as usize,
                        inserted: row.get::<_, i64>(5)? as usize,
                        skipped: row.get::<_, i64>(6)? as usize,
                        rejected: BTreeMap::new(),
                        imported_at: Utc::now(),
                    },
                    rejected_json,
                    imported_at,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut batch, rejected_json, imported_at)| {
                batch.rejected = serde_json::from_str::<BTreeMap<RejectReason, usize>>(
                    &rejected_json,
                )
                .map_err(|e| RepositoryError::FieldValueError {
                    field: "rejected_json".to_string(),
                    message: e.to_string(),
                })?;
                batch.imported_at = DateTime::parse_from_rfc3339(&imported_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| RepositoryError::FieldValueError {
                        field: "imported_at".to_string(),
                        message: e.to_string(),
                    })?;
                Ok(batch)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_repo() -> ImportLogRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ImportLogRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn batch(id: &str, path: &str) -> ImportBatch {
        let mut rejected = BTreeMap::new();
        rejected.insert(RejectReason::MissingRequiredField, 2);
        ImportBatch {
            batch_id: id.to_string(),
            source_path: Some(path.to_string()),
            file_name: Some("2025_08_17.csv".to_string()),
            encoding: "cp932".to_string(),
            attempted: 10,
            inserted: 7,
            skipped: 1,
            rejected,
            imported_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_been_imported() {
        let repo = memory_repo();
        assert!(!repo.has_been_imported("/inbox/2025_08_17.csv").unwrap());

        repo.insert(&batch("b1", "/inbox/2025_08_17.csv")).unwrap();
        assert!(repo.has_been_imported("/inbox/2025_08_17.csv").unwrap());
        assert!(!repo.has_been_imported("/inbox/2025_08_18.csv").unwrap());
    }

    #[test]
    fn test_recent_round_trips_rejection_tally() {
        let repo = memory_repo();
        repo.insert(&batch("b1", "/inbox/a.csv")).unwrap();

        let recent = repo.recent(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].encoding, "cp932");
        assert_eq!(
            recent[0].rejected.get(&RejectReason::MissingRequiredField),
            Some(&2)
        );
    }
}

// ==========================================
// 收获记录导入系统 - 收获事实存储实现
// ==========================================
// 职责: harvest_fact 表的批量插入与条件查询（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 并发: insert_new 使用 BEGIN IMMEDIATE，写者之间串行；
//       UNIQUE(harvest_date, company, crop, amount_key) 兜底防止重复身份
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::harvest::{amount_key, HarvestFilter, HarvestRecord, RecordIdentity};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::harvest_store::HarvestStore;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = "SELECT harvest_date, company, crop, amount_kg, source_file FROM harvest_fact";

// ==========================================
// SqliteHarvestStore
// ==========================================
pub struct SqliteHarvestStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHarvestStore {
    /// 打开数据库文件并确保表结构存在
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<HarvestRecord> {
        Ok(HarvestRecord {
            harvest_date: row.get::<_, NaiveDate>(0)?,
            company: row.get(1)?,
            crop: row.get(2)?,
            amount_kg: row.get(3)?,
            source_file: row.get(4)?,
        })
    }

    /// 构建 WHERE 子句与参数（空条件不加约束）
    fn build_filter(filter: &HarvestFilter) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(from) = filter.date_from {
            clauses.push("harvest_date >= ?".to_string());
            values.push(Value::Text(format_date(from)));
        }
        if let Some(to) = filter.date_to {
            clauses.push("harvest_date <= ?".to_string());
            values.push(Value::Text(format_date(to)));
        }
        if !filter.companies.is_empty() {
            clauses.push(format!("company IN ({})", placeholders(filter.companies.len())));
            values.extend(filter.companies.iter().cloned().map(Value::Text));
        }
        if !filter.crops.is_empty() {
            clauses.push(format!("crop IN ({})", placeholders(filter.crops.len())));
            values.extend(filter.crops.iter().cloned().map(Value::Text));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }

    fn distinct_column(&self, column: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT DISTINCT {col} FROM harvest_fact ORDER BY {col}",
            col = column
        );
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl HarvestStore for SqliteHarvestStore {
    fn insert_new(&self, records: &[HarvestRecord]) -> RepositoryResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO harvest_fact (
                    harvest_date, company, crop, amount_kg, amount_key, source_file
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;

            let mut count = 0;
            for record in records {
                count += stmt.execute(params![
                    format_date(record.harvest_date),
                    record.company,
                    record.crop,
                    record.amount_kg,
                    amount_key(record.amount_kg),
                    record.source_file,
                ])?;
            }
            count
        };

        tx.commit()?;
        debug!(candidates = records.len(), inserted, "harvest_fact 批量插入完成");
        Ok(inserted)
    }

    fn query(&self, filter: &HarvestFilter) -> RepositoryResult<Vec<HarvestRecord>> {
        let (where_clause, values) = Self::build_filter(filter);
        let sql = format!(
            "{}{} ORDER BY harvest_date, company, crop, id",
            SELECT_COLUMNS, where_clause
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), Self::map_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn existing_identities(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<HashSet<RecordIdentity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT harvest_date, company, crop, amount_key
            FROM harvest_fact
            WHERE harvest_date >= ?1 AND harvest_date <= ?2
            "#,
        )?;

        let identities = stmt
            .query_map(params![format_date(date_from), format_date(date_to)], |row| {
                Ok(RecordIdentity {
                    harvest_date: row.get::<_, NaiveDate>(0)?,
                    company: row.get(1)?,
                    crop: row.get(2)?,
                    amount_key: row.get(3)?,
                })
            })?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(identities)
    }

    fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM harvest_fact", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn date_bounds(&self) -> RepositoryResult<Option<(NaiveDate, NaiveDate)>> {
        let conn = self.get_conn()?;
        let bounds: (Option<NaiveDate>, Option<NaiveDate>) = conn.query_row(
            "SELECT MIN(harvest_date), MAX(harvest_date) FROM harvest_fact",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(match bounds {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    fn distinct_companies(&self) -> RepositoryResult<Vec<String>> {
        self.distinct_column("company")
    }

    fn distinct_crops(&self) -> RepositoryResult<Vec<String>> {
        self.distinct_column("crop")
    }
}

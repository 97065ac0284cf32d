// ==========================================
// 收获记录导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id='global')
// 约束: 缺失的键回退默认值；已知键的非法值报 ConfigError
// ==========================================

use crate::config::import_config_trait::IngestConfigReader;
use crate::config::ingest_config::DEFAULT_PREVIEW_ROWS;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::types::FutureDatePolicy;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_coercer::{
    DEFAULT_SERIAL_DATE_MAX, DEFAULT_SERIAL_DATE_MIN, SERIAL_DATE_LIMIT,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
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

    /// 从已有连接创建 ConfigManager（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（已知键先校验取值）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        validate_value(key, value)?;

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        debug!(key, value, "配置已更新");
        Ok(())
    }

    /// 所有 global 配置的快照（JSON，键有序）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        serde_json::to_string(&config_map).map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

fn config_error(key: &str, message: impl Into<String>) -> ImportError {
    ImportError::ConfigError {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_policy(key: &str, value: &str) -> ImportResult<FutureDatePolicy> {
    FutureDatePolicy::parse(value)
        .ok_or_else(|| config_error(key, format!("未知策略 '{}'（EXCLUDE / FAIL_FILE）", value)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ImportResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| config_error(key, format!("不是合法数值: '{}'", value)))
}

/// 序列日: 0 ..= SERIAL_DATE_LIMIT
fn parse_serial(key: &str, value: &str) -> ImportResult<i64> {
    let n = parse_number::<i64>(key, value)?;
    if !(0..=SERIAL_DATE_LIMIT).contains(&n) {
        return Err(config_error(
            key,
            format!("序列日须在 0..={} 之间: {}", SERIAL_DATE_LIMIT, n),
        ));
    }
    Ok(n)
}

fn parse_bool(key: &str, value: &str) -> ImportResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(config_error(key, format!("不是合法布尔值: '{}'", value))),
    }
}

/// 已知键的取值校验（未知键放行）
fn validate_value(key: &str, value: &str) -> ImportResult<()> {
    match key {
        config_keys::FUTURE_DATE_POLICY => parse_policy(key, value).map(|_| ()),
        config_keys::SERIAL_DATE_MIN | config_keys::SERIAL_DATE_MAX => {
            parse_serial(key, value).map(|_| ())
        }
        config_keys::PREVIEW_ROWS => parse_number::<usize>(key, value).map(|_| ()),
        config_keys::SKIP_IMPORTED_FILES => parse_bool(key, value).map(|_| ()),
        _ => Ok(()),
    }
}

// ==========================================
// IngestConfigReader Trait 实现
// ==========================================
impl IngestConfigReader for ConfigManager {
    fn get_future_date_policy(&self) -> ImportResult<FutureDatePolicy> {
        let key = config_keys::FUTURE_DATE_POLICY;
        let value = self.get_config_or_default(key, FutureDatePolicy::Exclude.as_str())?;
        parse_policy(key, &value)
    }

    fn get_serial_date_range(&self) -> ImportResult<(i64, i64)> {
        let min_value = self.get_config_or_default(
            config_keys::SERIAL_DATE_MIN,
            &DEFAULT_SERIAL_DATE_MIN.to_string(),
        )?;
        let max_value = self.get_config_or_default(
            config_keys::SERIAL_DATE_MAX,
            &DEFAULT_SERIAL_DATE_MAX.to_string(),
        )?;
        let min = parse_serial(config_keys::SERIAL_DATE_MIN, &min_value)?;
        let max = parse_serial(config_keys::SERIAL_DATE_MAX, &max_value)?;

        if min > max {
            return Err(config_error(
                config_keys::SERIAL_DATE_MIN,
                format!("下限 {} 大于上限 {}", min, max),
            ));
        }
        Ok((min, max))
    }

    fn get_preview_rows(&self) -> ImportResult<usize> {
        let key = config_keys::PREVIEW_ROWS;
        let value = self.get_config_or_default(key, &DEFAULT_PREVIEW_ROWS.to_string())?;
        parse_number::<usize>(key, &value)
    }

    fn get_skip_imported_files(&self) -> ImportResult<bool> {
        let key = config_keys::SKIP_IMPORTED_FILES;
        let value = self.get_config_or_default(key, "true")?;
        parse_bool(key, &value)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 未来日策略
    pub const FUTURE_DATE_POLICY: &str = "ingest.future_date_policy";

    // 序列日区间
    pub const SERIAL_DATE_MIN: &str = "ingest.serial_date_min";
    pub const SERIAL_DATE_MAX: &str = "ingest.serial_date_max";

    // 预览
    pub const PREVIEW_ROWS: &str = "ingest.preview_rows";

    // 导入日志
    pub const SKIP_IMPORTED_FILES: &str = "ingest.skip_imported_files";
}

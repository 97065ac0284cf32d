// ==========================================
// 收获记录导入系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，两个会话同时上传时由 SQLite 排队而不是直接报 busy
// - 建表幂等（CREATE TABLE IF NOT EXISTS）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "HARVEST_INGEST_DB_PATH";

/// 默认数据库文件名
pub const DB_FILE_NAME: &str = "harvest.db";

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - busy_timeout 需要“每个连接”单独配置
/// - WAL 模式下读者不阻塞写事务（导入期间查询仍可进行）
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    // 内存库不支持 WAL，返回值忽略
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并确保 schema 已创建
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等）
///
/// harvest_fact:
/// - amount_kg 保留全精度
/// - amount_key = round(amount_kg, 3) 的整数形式，只用于去重唯一约束
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS harvest_fact (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            harvest_date TEXT NOT NULL,
            company TEXT NOT NULL,
            crop TEXT NOT NULL,
            amount_kg REAL NOT NULL,
            amount_key INTEGER NOT NULL,
            source_file TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (harvest_date, company, crop, amount_key)
        );

        CREATE INDEX IF NOT EXISTS idx_harvest_fact_date ON harvest_fact (harvest_date);

        CREATE TABLE IF NOT EXISTS harvest_import_log (
            batch_id TEXT PRIMARY KEY,
            source_path TEXT,
            file_name TEXT,
            encoding TEXT NOT NULL,
            attempted INTEGER NOT NULL,
            inserted INTEGER NOT NULL,
            skipped INTEGER NOT NULL,
            rejected_json TEXT NOT NULL,
            imported_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_harvest_import_log_path ON harvest_import_log (source_path);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库路径
///
/// 顺序: 环境变量 HARVEST_INGEST_DB_PATH → 用户数据目录/harvest-ingest/harvest.db → ./harvest.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DB_FILE_NAME);
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("harvest-ingest");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_identity_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let insert = "INSERT OR IGNORE INTO harvest_fact \
                      (harvest_date, company, crop, amount_kg, amount_key, source_file) \
                      VALUES ('2025-08-18', 'A社', 'トマト', 1.2, 1200, ?1)";
        assert_eq!(conn.execute(insert, ["a.csv"]).unwrap(), 1);
        assert_eq!(conn.execute(insert, ["b.csv"]).unwrap(), 0);
    }

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(DB_FILE_NAME) || std::env::var(DB_PATH_ENV).is_ok());
    }
}

// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、测试文件生成、初始数据写入
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use harvest_ingest::domain::HarvestRecord;
use harvest_ingest::repository::{HarvestStore, SqliteHarvestStore};
use rusqlite::Connection;
use std::error::Error;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = Connection::open(&db_path)?;
    harvest_ingest::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// 测试用"今天"
pub fn today() -> NaiveDate {
    d(2025, 8, 20)
}

/// Shift_JIS (cp932) 编码
pub fn encode_sjis(text: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = encoding_rs::SHIFT_JIS.encode(text);
    assert!(!had_errors, "测试文本必须可用 Shift_JIS 表示");
    bytes.into_owned()
}

/// UTF-8 + BOM
pub fn encode_utf8_bom(text: &str) -> Vec<u8> {
    let mut bytes = b"\xEF\xBB\xBF".to_vec();
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

/// UTF-16LE + BOM
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// 在目录下写入测试文件
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("写入测试文件失败");
    path
}

/// 直接写入初始记录（绕过导入管道）
pub fn seed_records(db_path: &str, records: &[HarvestRecord]) -> usize {
    let store = SqliteHarvestStore::new(db_path).expect("打开存储失败");
    store.insert_new(records).expect("初始数据写入失败")
}

/// 标准表头的 UTF-8 CSV 文本
pub fn standard_csv(rows: &[&str]) -> String {
    let mut text = String::from("収穫日,企業名,収穫野菜名,収穫量（ｇ）\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

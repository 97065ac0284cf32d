// ==========================================
// 收获记录导入系统 - 文件解析器实现
// ==========================================
// 支持: 分隔文本 (CSV/TSV, 已解码为 str) / Excel (.xlsx 字节)
// 输出: RawTable（表头 + 按列位置的数据行，不做任何清洗）
// 约束: 分隔文本行长度必须与表头一致（flexible=false），
//       否则视为该编码候选解析失败
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{Data, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;

/// 可嗅探的分隔符（优先顺序）
pub const SNIFF_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// xlsx (zip) 文件头
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

// ==========================================
// RawTable - 解码后的原始表格
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 取单元格（越界视为空串）
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 以原始表头为键的行视图（重复表头时后列覆盖前列）
    pub fn to_raw_rows(&self) -> Vec<HashMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<HashMap<_, _>>()
            })
            .collect()
    }
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|v| v.trim().is_empty())
}

// ==========================================
// 分隔文本解析
// ==========================================

/// 按给定分隔符解析已解码文本
pub fn parse_delimited(text: &str, delimiter: u8) -> ImportResult<RawTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ImportError::CsvParseError("缺少表头行".to_string()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Vec<String> = record.iter().map(|v| v.to_string()).collect();

        // 跳过完全空白的行
        if is_blank_row(&row) {
            continue;
        }
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

/// 依据首行各候选分隔符出现次数选择分隔符（引号内不计），全无则回退逗号
pub fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

    let mut counts = [0usize; SNIFF_DELIMITERS.len()];
    let mut in_quotes = false;
    for b in first_line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = SNIFF_DELIMITERS.iter().position(|d| *d == b) {
            counts[idx] += 1;
        }
    }

    // 次数相同时保持候选顺序
    let mut best = 0;
    for idx in 1..SNIFF_DELIMITERS.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    SNIFF_DELIMITERS[best]
}

// ==========================================
// Excel 解析
// ==========================================

/// 是否为 xlsx（zip 容器）字节
pub fn is_xlsx(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZIP_MAGIC)
}

/// 解析 xlsx 第一个工作表，首行为表头
pub fn parse_xlsx(bytes: &[u8]) -> ImportResult<RawTable> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter
        .next()
        .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无数据行".to_string()))?;
    let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();

    let mut rows = Vec::new();
    for data_row in rows_iter {
        let row: Vec<String> = data_row.iter().map(cell_to_string).collect();
        if is_blank_row(&row) {
            continue;
        }
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

/// 单元格转文本
///
/// - 整数值浮点输出为整数（"1500.0" → "1500"）
/// - 日期单元格输出序列日数整数部分，交给日期转换器的序列日分支
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::DateTime(dt) => format!("{}", dt.as_f64().floor() as i64),
        other => other.to_string(),
    }
}
